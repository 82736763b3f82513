// src/services/fixture_client.rs
// DOCUMENTATION: Scripted venue directory
// PURPOSE: Deterministic provider for tests, demos and offline runs (PROVIDER_MODE=fixture)

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use super::besttime_client::VenueDirectory;
use crate::config::SeedLocation;
use crate::errors::CrowdSenseError;
use crate::models::{
    JobHandle, LiveForecast, SearchProgress, Venue, VenueFilterParams, VenueFilterResponse,
    VenueFilterVenue, WeekRawResponse,
};

/// Scripted behaviour of one search job
#[derive(Debug, Clone)]
struct JobScript {
    collection_id: String,
    /// Polls answered with job_finished=false before the job finishes
    pending_polls: u32,
    venues: Vec<Venue>,
    fail_poll: bool,
    polls: u32,
}

#[derive(Debug, Clone)]
enum SeedScript {
    Job(String),
    Fail,
}

#[derive(Debug, Default)]
struct FixtureState {
    seeds: HashMap<String, SeedScript>,
    jobs: HashMap<String, JobScript>,
    /// Venues returned by any unscripted seed
    default_venues: Option<Vec<Venue>>,
    venues: HashMap<String, Venue>,
    live: HashMap<String, LiveForecast>,
    filters: HashMap<String, VenueFilterResponse>,
    default_filter: Option<VenueFilterResponse>,
    week_raw: HashMap<String, WeekRawResponse>,
    calls: Vec<String>,
    next_job: u32,
}

fn seed_key(lat: f64, lng: f64) -> String {
    format!("{:.4},{:.4}", lat, lng)
}

fn missing(what: &str, id: &str) -> CrowdSenseError {
    CrowdSenseError::ExternalApiError(format!("fixture has no {} for {}", what, id))
}

/// In-process VenueDirectory answering from scripted data
/// DOCUMENTATION: Unscripted lookups fail with ExternalApiError, every call is recorded
#[derive(Debug, Default)]
pub struct FixtureVenueDirectory {
    state: Mutex<FixtureState>,
}

impl FixtureVenueDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a saved search response; every search finishes on its first poll with these venues
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CrowdSenseError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrowdSenseError::InvalidInput(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        let response: SearchProgress = serde_json::from_str(&raw)?;

        log::info!(
            "Loaded fixture with {} venues from {}",
            response.venues.len(),
            path.display()
        );

        let filter_venues = response
            .venues
            .iter()
            .map(|v| VenueFilterVenue {
                day_int: 0,
                day_raw: Vec::new(),
                day_raw_whole: None,
                day_info: None,
                venue_address: v.venue_address.clone(),
                venue_lat: v.venue_lat,
                venue_lng: v.venue_lng,
                venue_id: v.venue_id.clone(),
                venue_name: v.venue_name.clone(),
                venue_type: v.venue_type.clone(),
                venue_dwell_time_min: v.venue_dwell_time_min,
                venue_dwell_time_max: v.venue_dwell_time_max,
                price_level: v.price_level,
                rating: v.rating,
                reviews: v.reviews,
            })
            .collect();

        let fixture = Self::new()
            .with_default_search(response.venues.clone())
            .with_default_filter_response(VenueFilterResponse::ok(filter_venues));
        Ok(response
            .venues
            .into_iter()
            .fold(fixture, |f, venue| f.with_venue(venue)))
    }

    /// Script the job started for `seed`
    pub fn with_search_job(
        mut self,
        seed: &SeedLocation,
        job_id: &str,
        venues: Vec<Venue>,
        pending_polls: u32,
    ) -> Self {
        let state = self.state.get_mut();
        state
            .seeds
            .insert(seed_key(seed.lat, seed.lng), SeedScript::Job(job_id.to_string()));
        state.jobs.insert(
            job_id.to_string(),
            JobScript {
                collection_id: format!("col_{}", job_id),
                pending_polls,
                venues,
                fail_poll: false,
                polls: 0,
            },
        );
        self
    }

    /// Starting a search for `seed` fails
    pub fn with_failing_search(mut self, seed: &SeedLocation) -> Self {
        self.state
            .get_mut()
            .seeds
            .insert(seed_key(seed.lat, seed.lng), SeedScript::Fail);
        self
    }

    /// Polling `job_id` fails with a transport error
    pub fn with_failing_poll(mut self, job_id: &str) -> Self {
        if let Some(job) = self.state.get_mut().jobs.get_mut(job_id) {
            job.fail_poll = true;
        }
        self
    }

    pub fn with_default_search(mut self, venues: Vec<Venue>) -> Self {
        self.state.get_mut().default_venues = Some(venues);
        self
    }

    pub fn with_venue(mut self, venue: Venue) -> Self {
        self.state
            .get_mut()
            .venues
            .insert(venue.venue_id.clone(), venue);
        self
    }

    pub fn with_live_forecast(mut self, venue_id: &str, forecast: LiveForecast) -> Self {
        self.state
            .get_mut()
            .live
            .insert(venue_id.to_string(), forecast);
        self
    }

    /// Filter response for queries centred on (lat, lng)
    pub fn with_filter_response(mut self, lat: f64, lng: f64, response: VenueFilterResponse) -> Self {
        self.state
            .get_mut()
            .filters
            .insert(seed_key(lat, lng), response);
        self
    }

    pub fn with_default_filter_response(mut self, response: VenueFilterResponse) -> Self {
        self.state.get_mut().default_filter = Some(response);
        self
    }

    pub fn with_week_raw(mut self, venue_id: &str, response: WeekRawResponse) -> Self {
        self.state
            .get_mut()
            .week_raw
            .insert(venue_id.to_string(), response);
        self
    }

    /// Calls received so far, e.g. "poll:j1", "live:v1"
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Replace the live forecast answered for a venue
    pub async fn set_live_forecast(&self, venue_id: &str, forecast: LiveForecast) {
        self.state
            .lock()
            .await
            .live
            .insert(venue_id.to_string(), forecast);
    }
}

#[async_trait]
impl VenueDirectory for FixtureVenueDirectory {
    async fn start_search(&self, seed: &SeedLocation) -> Result<JobHandle, CrowdSenseError> {
        let mut state = self.state.lock().await;
        let key = seed_key(seed.lat, seed.lng);
        state.calls.push(format!("start_search:{}", key));

        let job_id = match state.seeds.get(&key).cloned() {
            Some(SeedScript::Job(job_id)) => job_id,
            Some(SeedScript::Fail) => {
                return Err(CrowdSenseError::ExternalApiError(format!(
                    "search rejected for {}",
                    key
                )))
            }
            None => {
                let venues = state
                    .default_venues
                    .clone()
                    .ok_or_else(|| missing("search", &key))?;
                state.next_job += 1;
                let job_id = format!("fixture-job-{}", state.next_job);
                state.jobs.insert(
                    job_id.clone(),
                    JobScript {
                        collection_id: format!("col_{}", job_id),
                        pending_polls: 0,
                        venues,
                        fail_poll: false,
                        polls: 0,
                    },
                );
                job_id
            }
        };

        let collection_id = state
            .jobs
            .get(&job_id)
            .map(|j| j.collection_id.clone())
            .unwrap_or_default();

        Ok(JobHandle {
            links: Default::default(),
            job_id,
            collection_id,
            status: "OK".to_string(),
            count_total: 0,
        })
    }

    async fn poll_progress(
        &self,
        job_id: &str,
        _collection_id: &str,
    ) -> Result<SearchProgress, CrowdSenseError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("poll:{}", job_id));

        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| missing("job", job_id))?;

        if job.fail_poll {
            return Err(CrowdSenseError::ExternalApiError(format!(
                "connection reset polling {}",
                job_id
            )));
        }

        job.polls += 1;
        let mut progress = if job.polls > job.pending_polls {
            SearchProgress::finished(job.venues.clone())
        } else {
            SearchProgress::pending()
        };
        progress.job_id = job_id.to_string();
        progress.collection_id = job.collection_id.clone();
        Ok(progress)
    }

    async fn get_venue(&self, venue_id: &str) -> Result<Venue, CrowdSenseError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("venue:{}", venue_id));
        state
            .venues
            .get(venue_id)
            .cloned()
            .ok_or_else(|| missing("venue", venue_id))
    }

    async fn get_live_forecast(&self, venue_id: &str) -> Result<LiveForecast, CrowdSenseError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("live:{}", venue_id));
        state
            .live
            .get(venue_id)
            .cloned()
            .ok_or_else(|| missing("live forecast", venue_id))
    }

    async fn run_filtered_search(
        &self,
        params: &VenueFilterParams,
    ) -> Result<VenueFilterResponse, CrowdSenseError> {
        let mut state = self.state.lock().await;
        let key = seed_key(params.lat.unwrap_or_default(), params.lng.unwrap_or_default());
        state.calls.push(format!("filter:{}", key));

        state
            .filters
            .get(&key)
            .or(state.default_filter.as_ref())
            .cloned()
            .ok_or_else(|| missing("filter response", &key))
    }

    async fn get_week_raw_forecast(
        &self,
        venue_id: &str,
    ) -> Result<WeekRawResponse, CrowdSenseError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("week:{}", venue_id));
        state
            .week_raw
            .get(venue_id)
            .cloned()
            .ok_or_else(|| missing("weekly forecast", venue_id))
    }
}
