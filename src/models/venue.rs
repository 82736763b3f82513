// src/models/venue.rs
// DOCUMENTATION: Core venue data structures
// PURPOSE: Venue records as cached in the geo store and served by the API

use serde::{Deserialize, Serialize};
use std::fmt;

use super::flexible::string_or_number;
use super::{LiveForecast, WeekRawDay};

/// Open/close time detail with hour and minute precision
/// Minute fields are absent in some provider responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCloseDetail {
    pub opens: i32,
    pub closes: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opens_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closes_minutes: Option<i32>,
}

/// Extended opening hours with multiple time windows (`venue_open_close_v2`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayInfoV2 {
    #[serde(default)]
    pub open_24h: Option<bool>,
    #[serde(default)]
    pub crosses_midnight: Option<bool>,
    #[serde(default)]
    pub day_text: Option<String>,
    /// null, a string or an object depending on the day
    #[serde(default)]
    pub special_day: Option<serde_json::Value>,
    #[serde(default, rename = "24h")]
    pub h24: Vec<OpenCloseDetail>,
    #[serde(default, rename = "12h")]
    pub h12: Vec<String>,
}

/// Summary information for a single day's forecast
/// DOCUMENTATION: day_max/day_mean are absent for closed days
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayInfo {
    #[serde(default)]
    pub day_int: i32,
    #[serde(default)]
    pub day_max: Option<i32>,
    #[serde(default)]
    pub day_mean: Option<i32>,
    #[serde(default)]
    pub day_rank_max: Option<i32>,
    #[serde(default)]
    pub day_rank_mean: Option<i32>,
    #[serde(default)]
    pub day_text: String,
    /// Opening hour; the provider sends a number or a string
    #[serde(default, deserialize_with = "string_or_number")]
    pub venue_open: String,
    /// Closing hour; the provider sends a number or a string
    #[serde(default, deserialize_with = "string_or_number")]
    pub venue_closed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_open_close_v2: Option<DayInfoV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Forecast data for a specific day with hourly busyness values (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootTrafficForecast {
    pub day_int: i32,
    #[serde(default)]
    pub day_raw: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_info: Option<DayInfo>,
}

/// Venue with location, metadata and forecast data
/// DOCUMENTATION: Stored as JSON under venues_geo_place_v1:{venue_id}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub forecast: bool,

    #[serde(default)]
    pub processed: bool,

    #[serde(default)]
    pub venue_address: String,

    pub venue_lat: f64,

    /// Longitude; older payloads wrote it as venue_lon
    #[serde(alias = "venue_lon")]
    pub venue_lng: f64,

    #[serde(default)]
    pub venue_name: String,

    /// Provider identifier, empty for records that lack one
    #[serde(default)]
    pub venue_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_dwell_time_min: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_dwell_time_max: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_level: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_foot_traffic_forecast: Option<Vec<FootTrafficForecast>>,
}

impl Venue {
    /// Minimal venue, mostly for fixtures and tests
    pub fn new(venue_id: &str, venue_name: &str, venue_lat: f64, venue_lng: f64) -> Self {
        Self {
            forecast: false,
            processed: false,
            venue_address: String::new(),
            venue_lat,
            venue_lng,
            venue_name: venue_name.to_string(),
            venue_id: venue_id.to_string(),
            venue_type: None,
            venue_dwell_time_min: None,
            venue_dwell_time_max: None,
            price_level: None,
            rating: None,
            reviews: None,
            venue_foot_traffic_forecast: None,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Venue(id={}, name={}, address={}, lat={:.6}, lng={:.6})",
            self.venue_id, self.venue_name, self.venue_address, self.venue_lat, self.venue_lng
        )
    }
}

/// Venue merged with its cached live and weekly data (verbose responses)
#[derive(Debug, Clone, Serialize)]
pub struct VenueWithLive {
    pub venue: Venue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_forecast: Option<LiveForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_forecast: Option<WeekRawDay>,
}

impl VenueWithLive {
    /// Live busyness, only when the cached entry reports it available
    pub fn live_busyness(&self) -> Option<i32> {
        self.live_forecast
            .as_ref()
            .filter(|lf| lf.analysis.venue_live_busyness_available)
            .map(|lf| lf.analysis.venue_live_busyness)
    }
}

/// Minified venue for non-verbose responses
#[derive(Debug, Clone, Serialize)]
pub struct MinifiedVenue {
    pub forecast: bool,
    pub processed: bool,
    pub venue_address: String,
    pub venue_lat: f64,
    pub venue_lng: f64,
    pub venue_name: String,
    pub venue_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_foot_traffic_forecast: Option<Vec<FootTrafficForecast>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_live_busyness: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_forecast: Option<WeekRawDay>,
}

impl From<VenueWithLive> for MinifiedVenue {
    fn from(merged: VenueWithLive) -> Self {
        let venue_live_busyness = merged.live_busyness();
        let v = merged.venue;

        MinifiedVenue {
            forecast: v.forecast,
            processed: v.processed,
            venue_address: v.venue_address,
            venue_lat: v.venue_lat,
            venue_lng: v.venue_lng,
            venue_name: v.venue_name,
            venue_id: v.venue_id,
            venue_type: v.venue_type,
            price_level: v.price_level,
            rating: v.rating,
            reviews: v.reviews,
            venue_foot_traffic_forecast: v.venue_foot_traffic_forecast,
            venue_live_busyness,
            weekly_forecast: merged.weekly_forecast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_accepts_legacy_lon_field() {
        let json = r#"{
            "forecast": true,
            "processed": true,
            "venue_address": "Rua da Moeda 140, Recife",
            "venue_lat": -8.0631,
            "venue_lon": -34.8711,
            "venue_name": "Bar do Cais",
            "venue_id": "ven_abc"
        }"#;

        let venue: Venue = serde_json::from_str(json).unwrap();
        assert_eq!(venue.venue_lng, -34.8711);
        assert_eq!(venue.venue_id, "ven_abc");
        assert!(venue.venue_foot_traffic_forecast.is_none());
    }

    #[test]
    fn test_day_info_normalizes_open_close() {
        let json = r#"{
            "day_int": 4,
            "day_text": "Friday",
            "venue_open": 18,
            "venue_closed": "Closed"
        }"#;

        let info: DayInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.venue_open, "18");
        assert_eq!(info.venue_closed, "Closed");
        assert!(info.day_max.is_none());
    }

    #[test]
    fn test_venue_round_trips_through_cache_format() {
        let mut venue = Venue::new("ven_1", "Estelita", -8.07, -34.90);
        venue.venue_foot_traffic_forecast = Some(vec![FootTrafficForecast {
            day_int: 5,
            day_raw: vec![0, 10, 20],
            day_info: None,
        }]);

        let json = serde_json::to_string(&venue).unwrap();
        assert!(json.contains("\"venue_lng\""));
        assert!(!json.contains("\"venue_type\""));

        let back: Venue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, venue);
    }

    #[test]
    fn test_day_info_v2_renamed_fields() {
        let json = r#"{"24h": [{"opens": 7, "closes": 21}], "12h": ["7am-9pm"]}"#;
        let v2: DayInfoV2 = serde_json::from_str(json).unwrap();

        assert_eq!(v2.h24.len(), 1);
        assert_eq!(v2.h24[0].opens, 7);
        assert!(v2.h24[0].opens_minutes.is_none());
        assert_eq!(v2.h12, vec!["7am-9pm".to_string()]);
    }
}
