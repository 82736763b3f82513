// src/config/discovery.rs
// DOCUMENTATION: Venue discovery settings
// PURPOSE: Seed locations, filter parameters and polling policy handed to the refresher

use crate::config::env::parse_env;
use crate::models::VenueFilterParams;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// A geographic point used to bootstrap provider searches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedLocation {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in meters
    pub radius_m: u32,
    /// Max venues requested for this seed
    pub limit: u32,
}

impl SeedLocation {
    pub const fn new(lat: f64, lng: f64, radius_m: u32, limit: u32) -> Self {
        Self {
            lat,
            lng,
            radius_m,
            limit,
        }
    }
}

/// Recife metro area: ZS/ZN, Olinda, Jaboatão/Candeias
pub const DEFAULT_SEEDS: [SeedLocation; 3] = [
    SeedLocation::new(-8.07834, -34.90938, 6000, 500),
    SeedLocation::new(-7.99081, -34.85141, 6000, 200),
    SeedLocation::new(-8.18160, -34.92980, 6000, 200),
];

/// Nightlife venue types requested from the filter endpoint
pub const NIGHTLIFE_VENUE_TYPES: [&str; 11] = [
    "BAR",
    "BREWERY",
    "CASINO",
    "CONCERT_HALL",
    "ADULT",
    "CLUBS",
    "EVENT_VENUE",
    "FOOD_AND_DRINK",
    "PERFORMING_ARTS",
    "ARTS",
    "WINERY",
];

/// Progress polls per search job before it is abandoned
pub const MAX_POLL_ATTEMPTS: u32 = 5;

/// Which provider flow a scheduled discovery run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Single-shot /venues/filter query per seed
    Filter,
    /// Background search job per seed, polled until finished
    Search,
}

impl FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filter" => Ok(DiscoveryMode::Filter),
            "search" => Ok(DiscoveryMode::Search),
            other => Err(format!("Unknown discovery mode: {}", other)),
        }
    }
}

/// Discovery configuration
/// DOCUMENTATION: Passed into VenueRefresher at construction time
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub seeds: Vec<SeedLocation>,
    pub mode: DiscoveryMode,
    pub venue_types: Vec<String>,
    pub busy_min: i32,
    pub foot_traffic: String,
    pub own_venues_only: bool,
    /// Overrides every seed's limit when greater than zero
    pub limit_override: u32,
    /// Base interval for search polling backoff
    pub poll_interval: Duration,
    /// Sleep one poll interval before the first poll
    pub initial_wait: bool,
    /// Fetch live forecasts for every venue upserted by a run
    pub fetch_live_after_upsert: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            seeds: DEFAULT_SEEDS.to_vec(),
            mode: DiscoveryMode::Filter,
            venue_types: NIGHTLIFE_VENUE_TYPES.iter().map(|t| t.to_string()).collect(),
            busy_min: 1,
            foot_traffic: "both".to_string(),
            own_venues_only: false,
            limit_override: 0,
            poll_interval: Duration::from_secs(15),
            initial_wait: true,
            fetch_live_after_upsert: true,
        }
    }
}

impl DiscoveryConfig {
    /// Build discovery settings from the environment
    /// DOCUMENTATION: Unset or malformed variables keep the defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let seeds = match env::var("SEED_LOCATIONS") {
            Ok(raw) if !raw.trim().is_empty() => match parse_seed_locations(&raw) {
                Ok(seeds) => seeds,
                Err(e) => {
                    log::warn!("Invalid SEED_LOCATIONS ({}), using default seeds", e);
                    defaults.seeds.clone()
                }
            },
            _ => defaults.seeds.clone(),
        };

        let venue_types = match env::var("DISCOVERY_VENUE_TYPES") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => defaults.venue_types.clone(),
        };

        Self {
            seeds,
            mode: parse_env("DISCOVERY_MODE", defaults.mode),
            venue_types,
            busy_min: parse_env("DISCOVERY_BUSY_MIN", defaults.busy_min),
            foot_traffic: env::var("DISCOVERY_FOOT_TRAFFIC").unwrap_or(defaults.foot_traffic),
            own_venues_only: parse_env("DISCOVERY_OWN_VENUES_ONLY", defaults.own_venues_only),
            limit_override: parse_env("FETCH_VENUE_LIMIT_OVERRIDE", defaults.limit_override),
            poll_interval: Duration::from_secs(parse_env(
                "BESTTIME_SEARCH_POLLING_WAIT_SECONDS",
                defaults.poll_interval.as_secs(),
            )),
            initial_wait: parse_env("BESTTIME_SEARCH_INITIAL_WAIT", defaults.initial_wait),
            fetch_live_after_upsert: parse_env(
                "DISCOVERY_FETCH_LIVE",
                defaults.fetch_live_after_upsert,
            ),
        }
    }

    /// Filter query for one seed
    pub fn filter_params_for(&self, seed: &SeedLocation) -> VenueFilterParams {
        let limit = if self.limit_override > 0 {
            self.limit_override
        } else {
            seed.limit
        };

        VenueFilterParams {
            busy_min: Some(self.busy_min),
            lat: Some(seed.lat),
            lng: Some(seed.lng),
            radius: Some(seed.radius_m),
            foot_traffic: Some(self.foot_traffic.clone()),
            limit: Some(limit),
            own_venues_only: Some(self.own_venues_only),
            types: Some(self.venue_types.clone()),
            ..VenueFilterParams::default()
        }
    }
}

/// Parse "lat,lng,radius,limit;lat,lng,radius,limit"
pub fn parse_seed_locations(raw: &str) -> Result<Vec<SeedLocation>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
            if parts.len() != 4 {
                return Err(format!("expected lat,lng,radius,limit in {:?}", entry));
            }

            let lat: f64 = parts[0]
                .parse()
                .map_err(|_| format!("bad latitude in {:?}", entry))?;
            let lng: f64 = parts[1]
                .parse()
                .map_err(|_| format!("bad longitude in {:?}", entry))?;
            let radius_m: u32 = parts[2]
                .parse()
                .map_err(|_| format!("bad radius in {:?}", entry))?;
            let limit: u32 = parts[3]
                .parse()
                .map_err(|_| format!("bad limit in {:?}", entry))?;

            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(format!("coordinates out of range in {:?}", entry));
            }

            Ok(SeedLocation::new(lat, lng, radius_m, limit))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_locations() {
        let seeds = parse_seed_locations("-8.07,-34.90,6000,500; 45.52,-73.55,1000,20").unwrap();

        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0], SeedLocation::new(-8.07, -34.90, 6000, 500));
        assert_eq!(seeds[1].radius_m, 1000);
        assert_eq!(seeds[1].limit, 20);
    }

    #[test]
    fn test_parse_seed_locations_rejects_bad_entries() {
        assert!(parse_seed_locations("-8.07,-34.90,6000").is_err());
        assert!(parse_seed_locations("abc,-34.90,6000,10").is_err());
        assert!(parse_seed_locations("95.0,-34.90,6000,10").is_err());
    }

    #[test]
    fn test_default_config_uses_recife_seeds() {
        let config = DiscoveryConfig::default();

        assert_eq!(config.seeds.len(), 3);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.venue_types.len(), NIGHTLIFE_VENUE_TYPES.len());
    }

    #[test]
    fn test_filter_params_for_seed() {
        let mut config = DiscoveryConfig::default();
        let params = config.filter_params_for(&DEFAULT_SEEDS[1]);

        assert_eq!(params.lat, Some(-7.99081));
        assert_eq!(params.radius, Some(6000));
        assert_eq!(params.limit, Some(200));
        assert_eq!(params.busy_min, Some(1));
        assert_eq!(params.foot_traffic.as_deref(), Some("both"));

        config.limit_override = 50;
        let params = config.filter_params_for(&DEFAULT_SEEDS[0]);
        assert_eq!(params.limit, Some(50));
    }
}
