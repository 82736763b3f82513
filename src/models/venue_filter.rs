// src/models/venue_filter.rs
// DOCUMENTATION: Venue filter request and response structures
// PURPOSE: Parameters and results of GET /venues/filter

use serde::{Deserialize, Serialize};

use super::{DayInfo, FootTrafficForecast, Venue};

/// Query parameters for the venue filter endpoint
/// DOCUMENTATION: Every field is optional, unset fields are omitted from the query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VenueFilterParams {
    pub collection_id: Option<String>,
    pub busy_min: Option<i32>,
    pub busy_max: Option<i32>,
    /// "any" | "all"
    pub busy_conf: Option<String>,
    /// "limited" | "day" | "both"
    pub foot_traffic: Option<String>,
    pub hour_min: Option<i32>,
    pub hour_max: Option<i32>,
    pub day_int: Option<i32>,
    pub now: Option<bool>,
    pub live: Option<bool>,
    pub types: Option<Vec<String>>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Meters
    pub radius: Option<u32>,
    pub lat_min: Option<f64>,
    pub lng_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lng_max: Option<f64>,
    pub price_min: Option<i32>,
    pub price_max: Option<i32>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub reviews_min: Option<i32>,
    pub reviews_max: Option<i32>,
    pub day_rank_min: Option<i32>,
    pub day_rank_max: Option<i32>,
    pub own_venues_only: Option<bool>,
    pub order_by: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

fn push<T: ToString>(params: &mut Vec<(String, String)>, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        params.push((key.to_string(), v.to_string()));
    }
}

impl VenueFilterParams {
    /// Convert to query pairs
    /// DOCUMENTATION: None values are skipped, booleans render as "true"/"false",
    /// types are comma-joined and skipped when empty
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        push(&mut params, "collection_id", &self.collection_id);
        push(&mut params, "busy_min", &self.busy_min);
        push(&mut params, "busy_max", &self.busy_max);
        push(&mut params, "busy_conf", &self.busy_conf);
        push(&mut params, "foot_traffic", &self.foot_traffic);
        push(&mut params, "hour_min", &self.hour_min);
        push(&mut params, "hour_max", &self.hour_max);
        push(&mut params, "day_int", &self.day_int);
        push(&mut params, "now", &self.now);
        push(&mut params, "live", &self.live);

        if let Some(types) = self.types.as_ref().filter(|t| !t.is_empty()) {
            params.push(("types".to_string(), types.join(",")));
        }

        push(&mut params, "lat", &self.lat);
        push(&mut params, "lng", &self.lng);
        push(&mut params, "radius", &self.radius);
        push(&mut params, "lat_min", &self.lat_min);
        push(&mut params, "lng_min", &self.lng_min);
        push(&mut params, "lat_max", &self.lat_max);
        push(&mut params, "lng_max", &self.lng_max);
        push(&mut params, "price_min", &self.price_min);
        push(&mut params, "price_max", &self.price_max);
        push(&mut params, "rating_min", &self.rating_min);
        push(&mut params, "rating_max", &self.rating_max);
        push(&mut params, "reviews_min", &self.reviews_min);
        push(&mut params, "reviews_max", &self.reviews_max);
        push(&mut params, "day_rank_min", &self.day_rank_min);
        push(&mut params, "day_rank_max", &self.day_rank_max);
        push(&mut params, "own_venues_only", &self.own_venues_only);
        push(&mut params, "order_by", &self.order_by);
        push(&mut params, "order", &self.order);
        push(&mut params, "limit", &self.limit);
        push(&mut params, "page", &self.page);

        params
    }
}

/// Time window metadata of a filter response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterWindow {
    #[serde(default)]
    pub day_window: String,
    #[serde(default)]
    pub day_window_end_int: i32,
    #[serde(default)]
    pub day_window_end_txt: String,
    #[serde(default)]
    pub day_window_start_int: i32,
    #[serde(default)]
    pub day_window_start_txt: String,
    #[serde(default)]
    pub time_local: i32,
    #[serde(default)]
    pub time_local_12: String,
    #[serde(default)]
    pub time_local_index: i32,
    #[serde(default)]
    pub time_window_end: i32,
    #[serde(default)]
    pub time_window_end_12: String,
    #[serde(default)]
    pub time_window_end_ix: i32,
    #[serde(default)]
    pub time_window_start: i32,
    #[serde(default)]
    pub time_window_start_12: String,
    #[serde(default)]
    pub time_window_start_ix: i32,
}

/// One venue record from a filter response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueFilterVenue {
    #[serde(default)]
    pub day_int: i32,
    #[serde(default)]
    pub day_raw: Vec<i32>,
    #[serde(default)]
    pub day_raw_whole: Option<Vec<i32>>,
    #[serde(default)]
    pub day_info: Option<DayInfo>,

    #[serde(default)]
    pub venue_address: String,
    pub venue_lat: f64,
    pub venue_lng: f64,
    #[serde(default)]
    pub venue_id: String,
    #[serde(default)]
    pub venue_name: String,

    #[serde(default)]
    pub venue_type: Option<String>,
    #[serde(default)]
    pub venue_dwell_time_min: Option<i32>,
    #[serde(default)]
    pub venue_dwell_time_max: Option<i32>,
    #[serde(default)]
    pub price_level: Option<i32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub reviews: Option<i32>,
}

impl VenueFilterVenue {
    /// Map a filter record onto the cached venue shape
    /// DOCUMENTATION: Filter results always carry forecasts, so forecast/processed are set,
    /// and the single day of foot traffic becomes a one-element forecast list
    pub fn into_venue(self) -> Venue {
        Venue {
            forecast: true,
            processed: true,
            venue_address: self.venue_address,
            venue_lat: self.venue_lat,
            venue_lng: self.venue_lng,
            venue_name: self.venue_name,
            venue_id: self.venue_id,
            venue_type: self.venue_type,
            venue_dwell_time_min: self.venue_dwell_time_min,
            venue_dwell_time_max: self.venue_dwell_time_max,
            price_level: self.price_level,
            rating: self.rating,
            reviews: self.reviews,
            venue_foot_traffic_forecast: Some(vec![FootTrafficForecast {
                day_int: self.day_int,
                day_raw: self.day_raw,
                day_info: self.day_info,
            }]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueFilterResponse {
    pub status: String,
    #[serde(default)]
    pub venues: Vec<VenueFilterVenue>,
    #[serde(default)]
    pub venues_n: i32,
    #[serde(default)]
    pub window: Option<FilterWindow>,
}

impl VenueFilterResponse {
    pub fn ok(venues: Vec<VenueFilterVenue>) -> Self {
        Self {
            status: "OK".to_string(),
            venues_n: venues.len() as i32,
            venues,
            window: None,
        }
    }
}
