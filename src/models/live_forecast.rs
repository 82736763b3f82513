// src/models/live_forecast.rs
// DOCUMENTATION: Live busyness forecast data structures
// PURPOSE: Response of POST /forecasts/live, cached under live_forecast_v1:{venue_id}

use serde::{Deserialize, Serialize};

/// Busyness numbers and availability flags
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub venue_forecasted_busyness: i32,
    #[serde(default)]
    pub venue_live_busyness: i32,
    #[serde(default)]
    pub venue_live_busyness_available: bool,
    #[serde(default)]
    pub venue_forecast_busyness_available: bool,
    #[serde(default)]
    pub venue_live_forecasted_delta: i32,
}

/// Venue metadata echoed by the live forecast endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VenueInfo {
    #[serde(default)]
    pub venue_current_gmttime: String,
    #[serde(default)]
    pub venue_current_localtime: String,
    #[serde(default)]
    pub venue_id: String,
    #[serde(default)]
    pub venue_name: String,
    #[serde(default)]
    pub venue_timezone: String,
    #[serde(default)]
    pub venue_dwell_time_min: i32,
    #[serde(default)]
    pub venue_dwell_time_max: i32,
    #[serde(default)]
    pub venue_dwell_time_avg: i32,
}

/// Live forecast snapshot for one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveForecast {
    #[serde(default)]
    pub analysis: Analysis,
    pub status: String,
    #[serde(default)]
    pub venue_info: VenueInfo,
}

impl LiveForecast {
    /// Only OK responses with live data available may live in the cache
    pub fn is_cacheable(&self) -> bool {
        self.status == "OK" && self.analysis.venue_live_busyness_available
    }

    pub fn venue_id(&self) -> &str {
        &self.venue_info.venue_id
    }

    /// Convenience constructor for fixtures and tests
    pub fn new(venue_id: &str, status: &str, busyness: i32, available: bool) -> Self {
        Self {
            analysis: Analysis {
                venue_live_busyness: busyness,
                venue_live_busyness_available: available,
                ..Analysis::default()
            },
            status: status.to_string(),
            venue_info: VenueInfo {
                venue_id: venue_id.to_string(),
                ..VenueInfo::default()
            },
        }
    }
}
