// src/db/store.rs
// DOCUMENTATION: Geo cache store abstraction
// PURPOSE: Key/value plus geospatial index operations shared by every backend

use async_trait::async_trait;

use crate::errors::CrowdSenseError;

/// Earth's radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Key/value store with a geospatial index
/// DOCUMENTATION: Values are serialized JSON strings. Implementations must write the
/// index member and its payload together, so a reader never sees one without the other
/// except when the payload was deleted out-of-band.
#[async_trait]
pub trait GeoCacheStore: Send + Sync {
    /// Store a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), CrowdSenseError>;

    /// Fetch a value, None when absent
    async fn get(&self, key: &str) -> Result<Option<String>, CrowdSenseError>;

    /// Remove a value; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<(), CrowdSenseError>;

    /// Keys matching a pattern where `*` matches any run of characters
    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CrowdSenseError>;

    /// Index `member_key` at (lat, lng) under `index_key` and store `payload` under `member_key`
    async fn add_location_with_payload(
        &self,
        index_key: &str,
        member_key: &str,
        lat: f64,
        lng: f64,
        payload: &str,
    ) -> Result<(), CrowdSenseError>;

    /// Payloads of members within `radius_km` of (lat, lng), nearest first
    /// DOCUMENTATION: Members whose payload is missing are skipped with a warning
    async fn find_within_radius(
        &self,
        index_key: &str,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<String>, CrowdSenseError>;
}

/// Great-circle distance in kilometers (Haversine formula)
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Match a key against a `*` wildcard pattern
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}
