// src/db/memory_store.rs
// DOCUMENTATION: In-memory geo cache store
// PURPOSE: Default backend for local runs and tests

use async_trait::async_trait;
use geo_types::Point;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{haversine_km, matches_pattern, GeoCacheStore};
use crate::errors::CrowdSenseError;

#[derive(Default)]
struct StoreState {
    values: HashMap<String, String>,
    /// index key -> (member key -> location)
    indexes: HashMap<String, HashMap<String, Point<f64>>>,
}

/// Thread-safe in-memory store
/// DOCUMENTATION: A single lock guards values and indexes, so a member and its
/// payload are always written together
#[derive(Clone, Default)]
pub struct InMemoryGeoStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryGeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub async fn len(&self) -> usize {
        self.state.read().await.values.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl GeoCacheStore for InMemoryGeoStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), CrowdSenseError> {
        let mut state = self.state.write().await;
        state.values.insert(key.to_string(), value.to_string());
        log::debug!("Store SET {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CrowdSenseError> {
        let state = self.state.read().await;
        Ok(state.values.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), CrowdSenseError> {
        let mut state = self.state.write().await;
        if state.values.remove(key).is_some() {
            log::debug!("Store DEL {}", key);
        }
        Ok(())
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CrowdSenseError> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .values
            .keys()
            .filter(|k| matches_pattern(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn add_location_with_payload(
        &self,
        index_key: &str,
        member_key: &str,
        lat: f64,
        lng: f64,
        payload: &str,
    ) -> Result<(), CrowdSenseError> {
        let mut state = self.state.write().await;
        state
            .indexes
            .entry(index_key.to_string())
            .or_default()
            .insert(member_key.to_string(), Point::new(lng, lat));
        state
            .values
            .insert(member_key.to_string(), payload.to_string());
        Ok(())
    }

    async fn find_within_radius(
        &self,
        index_key: &str,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<String>, CrowdSenseError> {
        let state = self.state.read().await;
        let Some(index) = state.indexes.get(index_key) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<(f64, &String)> = index
            .iter()
            .map(|(member, point)| (haversine_km(lat, lng, point.y(), point.x()), member))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let mut payloads = Vec::with_capacity(hits.len());
        for (_, member) in hits {
            match state.values.get(member) {
                Some(payload) => payloads.push(payload.clone()),
                None => log::warn!("Geo member {} has no payload, skipping", member),
            }
        }

        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "idx";

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryGeoStore::new();

        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // deleting an absent key is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = InMemoryGeoStore::new();
        store.set("live_forecast_v1:b", "{}").await.unwrap();
        store.set("live_forecast_v1:a", "{}").await.unwrap();
        store.set("venues_geo_place_v1:c", "{}").await.unwrap();

        let keys = store.list_keys("live_forecast_v1:*").await.unwrap();
        assert_eq!(keys, vec!["live_forecast_v1:a", "live_forecast_v1:b"]);
    }

    #[tokio::test]
    async fn test_radius_includes_center_and_orders_by_distance() {
        let store = InMemoryGeoStore::new();
        store
            .add_location_with_payload(INDEX, "far", -8.0700, -34.8711, "far")
            .await
            .unwrap();
        store
            .add_location_with_payload(INDEX, "center", -8.0631, -34.8711, "center")
            .await
            .unwrap();
        store
            .add_location_with_payload(INDEX, "outside", -8.5, -34.8711, "outside")
            .await
            .unwrap();

        let found = store
            .find_within_radius(INDEX, -8.0631, -34.8711, 2.0)
            .await
            .unwrap();
        assert_eq!(found, vec!["center", "far"]);

        // zero radius still returns the member at distance zero
        let exact = store
            .find_within_radius(INDEX, -8.0631, -34.8711, 0.0)
            .await
            .unwrap();
        assert_eq!(exact, vec!["center"]);
    }

    #[tokio::test]
    async fn test_missing_payload_is_skipped() {
        let store = InMemoryGeoStore::new();
        store
            .add_location_with_payload(INDEX, "m1", 1.0, 1.0, "p1")
            .await
            .unwrap();
        store
            .add_location_with_payload(INDEX, "m2", 1.0, 1.0, "p2")
            .await
            .unwrap();
        store.delete("m1").await.unwrap();

        let found = store.find_within_radius(INDEX, 1.0, 1.0, 1.0).await.unwrap();
        assert_eq!(found, vec!["p2"]);
    }

    #[tokio::test]
    async fn test_unknown_index_is_empty() {
        let store = InMemoryGeoStore::new();
        let found = store.find_within_radius("nope", 0.0, 0.0, 10.0).await.unwrap();
        assert!(found.is_empty());
    }
}
