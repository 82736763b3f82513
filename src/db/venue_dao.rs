// src/db/venue_dao.rs
// DOCUMENTATION: Venue cache access layer
// PURPOSE: Typed venue/forecast operations over the geo cache store and its key schema

use std::sync::Arc;

use super::store::GeoCacheStore;
use crate::errors::CrowdSenseError;
use crate::models::{LiveForecast, Venue, WeekRawDay};

/// Geospatial index holding every cached venue
pub const VENUES_GEO_KEY: &str = "venues_geo_v1";
pub const VENUE_PLACE_PREFIX: &str = "venues_geo_place_v1:";
pub const LIVE_FORECAST_PREFIX: &str = "live_forecast_v1:";
pub const WEEKLY_FORECAST_PREFIX: &str = "weekly_forecast_v1:";

pub fn venue_key(venue_id: &str) -> String {
    format!("{}{}", VENUE_PLACE_PREFIX, venue_id)
}

pub fn live_forecast_key(venue_id: &str) -> String {
    format!("{}{}", LIVE_FORECAST_PREFIX, venue_id)
}

pub fn weekly_forecast_key(venue_id: &str, day_int: i32) -> String {
    format!("{}{}_{}", WEEKLY_FORECAST_PREFIX, venue_id, day_int)
}

/// DAO for venues, live forecasts and weekly forecasts
/// DOCUMENTATION: Cheap to clone; every clone shares the same store
#[derive(Clone)]
pub struct VenueCacheDao {
    store: Arc<dyn GeoCacheStore>,
}

impl VenueCacheDao {
    pub fn new(store: Arc<dyn GeoCacheStore>) -> Self {
        Self { store }
    }

    /// Insert or replace a venue in the geo index
    /// DOCUMENTATION: Index member and JSON payload are written together under venues_geo_place_v1:{id}
    pub async fn upsert_venue(&self, venue: &Venue) -> Result<(), CrowdSenseError> {
        let payload = serde_json::to_string(venue)?;
        self.store
            .add_location_with_payload(
                VENUES_GEO_KEY,
                &venue_key(&venue.venue_id),
                venue.venue_lat,
                venue.venue_lng,
                &payload,
            )
            .await
    }

    /// Venues within `radius_km` of a point, nearest first
    /// DOCUMENTATION: Fails on the first payload that does not parse
    pub async fn get_nearby_venues(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<Venue>, CrowdSenseError> {
        let payloads = self
            .store
            .find_within_radius(VENUES_GEO_KEY, lat, lng, radius_km)
            .await?;

        payloads
            .iter()
            .map(|p| serde_json::from_str::<Venue>(p).map_err(CrowdSenseError::from))
            .collect()
    }

    /// Every cached venue; unreadable entries are logged and skipped
    pub async fn list_all_venues(&self) -> Result<Vec<Venue>, CrowdSenseError> {
        let keys = self
            .store
            .list_keys(&format!("{}*", VENUE_PLACE_PREFIX))
            .await?;

        let mut venues = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(payload)) => match serde_json::from_str::<Venue>(&payload) {
                    Ok(venue) => venues.push(venue),
                    Err(e) => log::error!("Corrupt venue payload at {}: {}", key, e),
                },
                Ok(None) => {}
                Err(e) => log::error!("Failed to read {}: {}", key, e),
            }
        }

        Ok(venues)
    }

    /// Cache a live forecast under live_forecast_v1:{venue_info.venue_id}
    pub async fn set_live_forecast(&self, forecast: &LiveForecast) -> Result<(), CrowdSenseError> {
        let payload = serde_json::to_string(forecast)?;
        self.store
            .set(&live_forecast_key(forecast.venue_id()), &payload)
            .await
    }

    pub async fn get_live_forecast(
        &self,
        venue_id: &str,
    ) -> Result<Option<LiveForecast>, CrowdSenseError> {
        match self.store.get(&live_forecast_key(venue_id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_live_forecast(&self, venue_id: &str) -> Result<(), CrowdSenseError> {
        self.store.delete(&live_forecast_key(venue_id)).await
    }

    /// Venue IDs that currently have a live forecast cached
    pub async fn list_cached_live_forecast_venue_ids(&self) -> Result<Vec<String>, CrowdSenseError> {
        self.ids_with_prefix(LIVE_FORECAST_PREFIX).await
    }

    /// IDs of every venue in the geo cache
    pub async fn list_all_venue_ids(&self) -> Result<Vec<String>, CrowdSenseError> {
        self.ids_with_prefix(VENUE_PLACE_PREFIX).await
    }

    async fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CrowdSenseError> {
        let keys = self.store.list_keys(&format!("{}*", prefix)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect())
    }

    /// Cache one day of the weekly forecast under weekly_forecast_v1:{id}_{day_int}
    pub async fn set_week_raw_forecast(
        &self,
        venue_id: &str,
        day: &WeekRawDay,
    ) -> Result<(), CrowdSenseError> {
        let payload = serde_json::to_string(day)?;
        self.store
            .set(&weekly_forecast_key(venue_id, day.day_int), &payload)
            .await
    }

    pub async fn get_week_raw_forecast(
        &self,
        venue_id: &str,
        day_int: i32,
    ) -> Result<Option<WeekRawDay>, CrowdSenseError> {
        match self.store.get(&weekly_forecast_key(venue_id, day_int)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
