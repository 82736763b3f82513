// src/services/refresher.rs
// DOCUMENTATION: Venue discovery orchestration
// PURPOSE: Pull venues from the provider (background search or filter) into the geo cache

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::besttime_client::VenueDirectory;
use super::forecast_refresher::{ForecastRefresher, ForecastStats};
use crate::config::{DiscoveryConfig, DiscoveryMode, SeedLocation, MAX_POLL_ATTEMPTS};
use crate::db::VenueCacheDao;
use crate::errors::CrowdSenseError;
use crate::models::{JobHandle, Venue, VenueFilterParams};

/// Discovery run statistics
/// DOCUMENTATION: Tracks results of one discovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Unique id of this run, used to correlate log lines
    pub run_id: Uuid,
    /// "search", "filter" or "known"
    pub mode: String,
    /// Search jobs started
    pub handles_started: u32,
    /// Search jobs that finished within the poll budget
    pub handles_finished: u32,
    /// Search jobs given up (unfinished or transport error)
    pub handles_abandoned: u32,
    /// Venue records received from the provider
    pub venues_received: u32,
    /// Venues written to the geo cache
    pub venues_upserted: u32,
    /// Records skipped as duplicate ID or name
    pub duplicates_skipped: u32,
    /// Records without ID and name
    pub invalid_skipped: u32,
    pub upsert_failures: u32,
    pub live_cached: u32,
    pub live_invalidated: u32,
    /// IDs upserted, in first-seen order
    pub venue_ids: Vec<String>,
    pub errors: Vec<String>,
    pub duration_seconds: u64,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl RefreshStats {
    pub fn new(mode: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode: mode.to_string(),
            handles_started: 0,
            handles_finished: 0,
            handles_abandoned: 0,
            venues_received: 0,
            venues_upserted: 0,
            duplicates_skipped: 0,
            invalid_skipped: 0,
            upsert_failures: 0,
            live_cached: 0,
            live_invalidated: 0,
            venue_ids: Vec::new(),
            errors: Vec::new(),
            duration_seconds: 0,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    /// Mark run as completed
    pub fn complete(&mut self, duration: u64) {
        self.duration_seconds = duration;
        self.completed_at = Some(Utc::now().to_rfc3339());
    }

    fn record_error(&mut self, message: String) {
        log::error!("[run {}] {}", self.run_id, message);
        self.errors.push(message);
    }

    fn absorb_live(&mut self, live: ForecastStats) {
        self.live_cached += live.live_cached;
        self.live_invalidated += live.live_invalidated;
        self.errors.extend(live.errors);
    }

    /// Sum per-seed runs into one
    pub fn aggregate(mode: &str, runs: &[RefreshStats]) -> RefreshStats {
        let mut total = RefreshStats::new(mode);

        for run in runs {
            total.handles_started += run.handles_started;
            total.handles_finished += run.handles_finished;
            total.handles_abandoned += run.handles_abandoned;
            total.venues_received += run.venues_received;
            total.venues_upserted += run.venues_upserted;
            total.duplicates_skipped += run.duplicates_skipped;
            total.invalid_skipped += run.invalid_skipped;
            total.upsert_failures += run.upsert_failures;
            total.live_cached += run.live_cached;
            total.live_invalidated += run.live_invalidated;
            total.venue_ids.extend(run.venue_ids.iter().cloned());
            total.errors.extend(run.errors.iter().cloned());
            total.duration_seconds += run.duration_seconds;
        }

        total.completed_at = Some(Utc::now().to_rfc3339());
        total
    }
}

/// Seen-ID and seen-name sets for one discovery run
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_ids: HashSet<String>,
    seen_names: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the ID (if any) or else the name (if any) was already seen
    pub fn is_duplicate(&self, venue_id: &str, venue_name: &str) -> bool {
        (!venue_id.is_empty() && self.seen_ids.contains(venue_id))
            || (!venue_name.is_empty() && self.seen_names.contains(venue_name))
    }

    pub fn mark_seen(&mut self, venue_id: &str, venue_name: &str) {
        if !venue_id.is_empty() {
            self.seen_ids.insert(venue_id.to_string());
        }
        if !venue_name.is_empty() {
            self.seen_names.insert(venue_name.to_string());
        }
    }
}

/// Discovery pipeline over a venue directory and the venue cache
/// DOCUMENTATION: Runs are sequential; per-item failures are logged and skipped,
/// so a run always completes with statistics unless listing the cache fails
pub struct VenueRefresher {
    dao: VenueCacheDao,
    directory: Arc<dyn VenueDirectory>,
    forecasts: ForecastRefresher,
    discovery: DiscoveryConfig,
}

impl VenueRefresher {
    pub fn new(
        dao: VenueCacheDao,
        directory: Arc<dyn VenueDirectory>,
        discovery: DiscoveryConfig,
    ) -> Self {
        let forecasts = ForecastRefresher::new(dao.clone(), directory.clone());
        Self {
            dao,
            directory,
            forecasts,
            discovery,
        }
    }

    /// Live/weekly refresher sharing this refresher's cache and provider
    pub fn forecasts(&self) -> &ForecastRefresher {
        &self.forecasts
    }

    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Run discovery in the configured mode
    pub async fn run_discovery(&self, fetch_live: bool) -> RefreshStats {
        match self.discovery.mode {
            DiscoveryMode::Filter => self.refresh_by_filter_for_seeds(fetch_live).await,
            DiscoveryMode::Search => {
                self.refresh_by_search(self.discovery.initial_wait, fetch_live)
                    .await
            }
        }
    }

    /// Boot chain: discovery, then live refresh of every known venue, then weekly refresh
    /// DOCUMENTATION: Steps run in order and a failed step does not stop the next one.
    /// Returns the first forecast refresh error, if any.
    pub async fn run_startup_sequence(&self, fetch_live: bool) -> Result<(), CrowdSenseError> {
        let discovery = self.run_discovery(fetch_live).await;
        log::info!(
            "[run {}] Startup discovery upserted {} venues ({} errors)",
            discovery.run_id,
            discovery.venue_ids.len(),
            discovery.errors.len()
        );

        let live = self.forecasts.refresh_all_known().await;
        match &live {
            Ok(stats) => log::info!(
                "Startup live refresh cached {} of {} venues",
                stats.live_cached,
                stats.venues_processed
            ),
            Err(e) => log::error!("Startup live refresh failed: {}", e),
        }

        let weekly = self.forecasts.refresh_weekly().await;
        match &weekly {
            Ok(stats) => log::info!(
                "Startup weekly refresh cached {} days ({} venues skipped)",
                stats.weekly_days_cached,
                stats.weekly_skipped
            ),
            Err(e) => log::error!("Startup weekly refresh failed: {}", e),
        }

        live.and(weekly).map(|_| ())
    }

    /// Background-search discovery over every configured seed
    /// DOCUMENTATION:
    /// 1. Start one search job per seed (failed seeds are dropped)
    /// 2. Optionally wait one poll interval
    /// 3. Poll each job to completion with linear backoff
    /// 4. Dedup by ID then name across all jobs and upsert
    /// 5. Optionally fetch live forecasts for the upserted IDs
    pub async fn refresh_by_search(&self, initial_wait: bool, fetch_live: bool) -> RefreshStats {
        let started = Instant::now();
        let mut stats = RefreshStats::new("search");

        log::info!(
            "[run {}] Starting search discovery for {} seeds",
            stats.run_id,
            self.discovery.seeds.len()
        );

        let mut handles: Vec<JobHandle> = Vec::new();
        for seed in &self.discovery.seeds {
            match self.directory.start_search(seed).await {
                Ok(handle) => {
                    stats.handles_started += 1;
                    handles.push(handle);
                }
                Err(e) => stats.record_error(format!(
                    "Search kick-off failed at ({:.6}, {:.6}): {}",
                    seed.lat, seed.lng, e
                )),
            }
        }

        if handles.is_empty() {
            log::warn!("[run {}] No search jobs started, nothing to refresh", stats.run_id);
            stats.complete(started.elapsed().as_secs());
            return stats;
        }

        if initial_wait {
            log::debug!("Waiting {:?} before first poll", self.discovery.poll_interval);
            tokio::time::sleep(self.discovery.poll_interval).await;
        }

        let mut dedup = Deduplicator::new();
        for handle in &handles {
            let venues = match self.poll_until_finished(handle).await {
                Ok(Some(venues)) => {
                    stats.handles_finished += 1;
                    venues
                }
                Ok(None) => {
                    stats.handles_abandoned += 1;
                    stats.record_error(format!(
                        "Job {} unfinished after {} polls, abandoned",
                        handle.job_id, MAX_POLL_ATTEMPTS
                    ));
                    continue;
                }
                Err(e) => {
                    stats.handles_abandoned += 1;
                    stats.record_error(format!("Polling job {} failed: {}", handle.job_id, e));
                    continue;
                }
            };

            stats.venues_received += venues.len() as u32;
            for venue in venues {
                if dedup.is_duplicate(&venue.venue_id, &venue.venue_name) {
                    log::debug!("Skipping duplicate venue {} ({})", venue.venue_id, venue.venue_name);
                    stats.duplicates_skipped += 1;
                    continue;
                }
                dedup.mark_seen(&venue.venue_id, &venue.venue_name);
                if !venue.venue_id.is_empty() {
                    stats.venue_ids.push(venue.venue_id.clone());
                }
                self.upsert(&venue, &mut stats).await;
            }
        }

        if fetch_live && !stats.venue_ids.is_empty() {
            let live = self.forecasts.refresh_ids(&stats.venue_ids).await;
            stats.absorb_live(live);
        }

        stats.complete(started.elapsed().as_secs());
        log::info!(
            "[run {}] Search discovery finished: {} jobs, {} upserted, {} duplicates, {} abandoned",
            stats.run_id,
            stats.handles_started,
            stats.venues_upserted,
            stats.duplicates_skipped,
            stats.handles_abandoned
        );
        stats
    }

    /// Poll a job until it finishes
    /// DOCUMENTATION: Ok(None) when still unfinished after max attempts; the wait
    /// after attempt n is poll_interval * n
    async fn poll_until_finished(
        &self,
        handle: &JobHandle,
    ) -> Result<Option<Vec<Venue>>, CrowdSenseError> {
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            let progress = self
                .directory
                .poll_progress(&handle.job_id, &handle.collection_id)
                .await?;

            if progress.job_finished {
                log::info!(
                    "Job {} finished after {} poll(s) with {} venues",
                    handle.job_id,
                    attempt,
                    progress.venues.len()
                );
                return Ok(Some(progress.venues));
            }

            if attempt < MAX_POLL_ATTEMPTS {
                let wait = backoff_delay(self.discovery.poll_interval, attempt);
                log::debug!(
                    "Job {} not finished ({}/{} completed), retrying in {:?}",
                    handle.job_id,
                    progress.count_completed,
                    progress.count_total,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Ok(None)
    }

    /// Single filtered discovery query
    /// DOCUMENTATION: Non-OK status yields an empty run. A record is marked seen only
    /// after its upsert succeeds.
    pub async fn refresh_by_filter(&self, params: &VenueFilterParams, fetch_live: bool) -> RefreshStats {
        let started = Instant::now();
        let mut stats = RefreshStats::new("filter");

        let response = match self.directory.run_filtered_search(params).await {
            Ok(response) => response,
            Err(e) => {
                stats.record_error(format!("Venue filter request failed: {}", e));
                stats.complete(started.elapsed().as_secs());
                return stats;
            }
        };

        if response.status != "OK" {
            log::warn!(
                "[run {}] Venue filter returned non-OK status {:?}; nothing upserted",
                stats.run_id,
                response.status
            );
            stats.complete(started.elapsed().as_secs());
            return stats;
        }

        stats.venues_received = response.venues.len() as u32;
        let mut dedup = Deduplicator::new();

        for record in response.venues {
            if record.venue_id.is_empty() && record.venue_name.is_empty() {
                log::debug!("Skipping venue with no id and no name");
                stats.invalid_skipped += 1;
                continue;
            }
            if dedup.is_duplicate(&record.venue_id, &record.venue_name) {
                log::debug!(
                    "Skipping duplicate venue {} ({:?})",
                    record.venue_id,
                    record.venue_name
                );
                stats.duplicates_skipped += 1;
                continue;
            }

            let venue = record.into_venue();
            log::info!(
                "Upserting venue id={}, name={:?}, lat={:.6}, lng={:.6}",
                venue.venue_id,
                venue.venue_name,
                venue.venue_lat,
                venue.venue_lng
            );

            if self.upsert(&venue, &mut stats).await {
                dedup.mark_seen(&venue.venue_id, &venue.venue_name);
                if !venue.venue_id.is_empty() {
                    stats.venue_ids.push(venue.venue_id);
                }
            }
        }

        if fetch_live && !stats.venue_ids.is_empty() {
            log::info!("Fetching live forecasts for {} venues", stats.venue_ids.len());
            let live = self.forecasts.refresh_ids(&stats.venue_ids).await;
            stats.absorb_live(live);
        }

        stats.complete(started.elapsed().as_secs());
        log::info!(
            "[run {}] Upserted {} unique venues via filter",
            stats.run_id,
            stats.venue_ids.len()
        );
        stats
    }

    /// Filtered discovery for every configured seed; per-seed results are summed
    pub async fn refresh_by_filter_for_seeds(&self, fetch_live: bool) -> RefreshStats {
        log::info!(
            "Starting filter refresh for {} seed locations",
            self.discovery.seeds.len()
        );

        let mut runs = Vec::with_capacity(self.discovery.seeds.len());
        for seed in &self.discovery.seeds {
            log::info!(
                "Filter refresh at lat={:.6}, lng={:.6} (radius={}, limit={})",
                seed.lat,
                seed.lng,
                seed.radius_m,
                seed.limit
            );
            let params = self.discovery.filter_params_for(seed);
            let run = self.refresh_by_filter(&params, fetch_live).await;
            log::info!(
                "Upserted {} venues for lat={:.6}, lng={:.6}",
                run.venue_ids.len(),
                seed.lat,
                seed.lng
            );
            runs.push(run);
        }

        let total = RefreshStats::aggregate("filter", &runs);
        log::info!(
            "Finished filter refresh for all seeds; total venues upserted={}",
            total.venue_ids.len()
        );
        total
    }

    /// Re-fetch every cached venue from the provider and upsert it
    pub async fn refresh_known_venues(&self) -> Result<RefreshStats, CrowdSenseError> {
        let started = Instant::now();
        let mut stats = RefreshStats::new("known");
        let ids = self.dao.list_all_venue_ids().await?;

        log::info!("[run {}] Refreshing {} known venues", stats.run_id, ids.len());

        for id in ids {
            match self.directory.get_venue(&id).await {
                Ok(venue) => {
                    stats.venues_received += 1;
                    if self.upsert(&venue, &mut stats).await {
                        stats.venue_ids.push(id);
                    }
                }
                Err(e) => stats.record_error(format!("Venue lookup failed for {}: {}", id, e)),
            }
        }

        stats.complete(started.elapsed().as_secs());
        Ok(stats)
    }

    /// Upsert one venue, recording the outcome; true on success
    async fn upsert(&self, venue: &Venue, stats: &mut RefreshStats) -> bool {
        match self.dao.upsert_venue(venue).await {
            Ok(()) => {
                stats.venues_upserted += 1;
                true
            }
            Err(e) => {
                stats.upsert_failures += 1;
                stats.record_error(format!("Upsert failed for {}: {}", venue.venue_id, e));
                false
            }
        }
    }
}

/// Wait before the next poll: base * attempt
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

/// Seeds that a run would use, for logging and the CLI
pub fn describe_seeds(seeds: &[SeedLocation]) -> Vec<String> {
    seeds
        .iter()
        .map(|s| format!("({:.5}, {:.5}) r={}m limit={}", s.lat, s.lng, s.radius_m, s.limit))
        .collect()
}
