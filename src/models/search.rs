// src/models/search.rs
// DOCUMENTATION: Background venue search job data structures
// PURPOSE: Responses of POST /venues/search and GET /venues/progress

use serde::{Deserialize, Serialize};

use super::Venue;

/// Tool links returned alongside a search job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub venue_search_progress: String,
    #[serde(default)]
    pub background_progress_tool: String,
    #[serde(default)]
    pub radar_tool: String,
    #[serde(default)]
    pub venue_filter_api: String,
}

/// Area covered by a finished search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lat_max: f64,
    #[serde(default)]
    pub lat_min: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    pub lng_max: f64,
    #[serde(default)]
    pub lng_min: f64,
    #[serde(default)]
    pub map_zoom: i32,
    #[serde(default)]
    pub radius: i32,
}

/// Response of starting a background search
/// DOCUMENTATION: job_id and collection_id identify the job for progress polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    #[serde(default, rename = "_links")]
    pub links: Links,
    pub job_id: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count_total: i32,
}

/// Snapshot of a search job
/// venues, venues_n and bounding_box are only meaningful once job_finished is true
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchProgress {
    #[serde(default, rename = "_links")]
    pub links: Links,
    #[serde(default)]
    pub count_total: i32,
    #[serde(default)]
    pub count_completed: i32,
    #[serde(default)]
    pub count_forecasted: i32,
    #[serde(default)]
    pub count_live: i32,
    #[serde(default)]
    pub count_failed: i32,
    #[serde(default)]
    pub job_finished: bool,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub venues: Vec<Venue>,
    #[serde(default)]
    pub venues_n: i32,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

impl SearchProgress {
    pub fn finished(venues: Vec<Venue>) -> Self {
        Self {
            job_finished: true,
            status: "OK".to_string(),
            venues_n: venues.len() as i32,
            venues,
            ..Self::default()
        }
    }

    pub fn pending() -> Self {
        Self {
            status: "OK".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unfinished_progress() {
        let json = r#"{
            "_links": {"venue_search_progress": "https://besttime.app/api/v1/venues/progress?job_id=j1"},
            "count_total": 20,
            "count_completed": 4,
            "job_finished": false,
            "job_id": "j1",
            "collection_id": "col_1",
            "status": "OK"
        }"#;

        let progress: SearchProgress = serde_json::from_str(json).unwrap();
        assert!(!progress.job_finished);
        assert!(progress.venues.is_empty());
        assert_eq!(progress.count_completed, 4);
        assert!(progress.links.venue_search_progress.contains("j1"));
    }

    #[test]
    fn test_parse_finished_progress_with_venues() {
        let json = r#"{
            "job_finished": true,
            "job_id": "j1",
            "status": "OK",
            "venues_n": 1,
            "venues": [{"venue_id": "v1", "venue_name": "Bar", "venue_lat": -8.1, "venue_lng": -34.9}],
            "bounding_box": {"lat": -8.1, "lng": -34.9, "radius": 2000}
        }"#;

        let progress: SearchProgress = serde_json::from_str(json).unwrap();
        assert!(progress.job_finished);
        assert_eq!(progress.venues[0].venue_id, "v1");
        assert_eq!(progress.bounding_box.radius, 2000);
    }

    #[test]
    fn test_parse_job_handle() {
        let handle: JobHandle =
            serde_json::from_str(r#"{"job_id": "j9", "collection_id": "col_9", "status": "OK"}"#)
                .unwrap();
        assert_eq!(handle.job_id, "j9");
        assert_eq!(handle.collection_id, "col_9");
    }
}
