// src/models/week_raw.rs
// DOCUMENTATION: Weekly raw forecast data structures
// PURPOSE: Response of GET /forecasts/week/raw2, cached per day

use serde::{Deserialize, Serialize};

use super::DayInfo;

/// One day of the weekly forecast
/// DOCUMENTATION: day_int 0 = Monday .. 6 = Sunday, day_raw holds 24 hourly values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRawDay {
    #[serde(default)]
    pub day_raw: Vec<i32>,
    pub day_int: i32,
    #[serde(default)]
    pub day_info: Option<DayInfo>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeekRawAnalysis {
    #[serde(default)]
    pub week_raw: Vec<WeekRawDay>,
}

/// Time scope of the forecast
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawWindow {
    #[serde(default)]
    pub time_window_start: i32,
    #[serde(default)]
    pub time_window_start_12h: String,
    #[serde(default)]
    pub day_window_start_int: i32,
    #[serde(default)]
    pub day_window_start_txt: String,
    #[serde(default)]
    pub day_window_end_int: i32,
    #[serde(default)]
    pub day_window_end_txt: String,
    #[serde(default)]
    pub time_window_end: i32,
    #[serde(default)]
    pub time_window_end_12h: String,
    #[serde(default)]
    pub week_window: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRawResponse {
    #[serde(default)]
    pub venue_address: String,
    #[serde(default)]
    pub window: RawWindow,
    pub status: String,
    #[serde(default)]
    pub analysis: WeekRawAnalysis,
    #[serde(default)]
    pub venue_name: String,
    #[serde(default)]
    pub venue_id: String,
}
