// src/services/scheduler.rs
// DOCUMENTATION: Periodic background jobs
// PURPOSE: Drive the startup refresh chain, then discovery, live refresh and weekly refresh on fixed intervals

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::refresher::VenueRefresher;
use crate::config::Config;
use crate::errors::CrowdSenseError;
use crate::metrics;

/// Owns the background job loops and their shutdown signal
/// DOCUMENTATION: Each job runs inline in its own task, so a job never overlaps
/// itself; ticks missed while a run is in progress are skipped. Interval jobs
/// never wait on each other, but none of them starts its clock until the startup
/// job (if any) has finished.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    ready_tx: Arc<watch::Sender<bool>>,
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (ready_tx, _) = watch::channel(true);
        Self {
            shutdown_tx,
            ready_tx: Arc::new(ready_tx),
            jobs: Vec::new(),
        }
    }

    /// Spawn a one-off job that holds back every interval job until it completes
    pub fn spawn_startup<Fut>(&mut self, name: &str, job: Fut)
    where
        Fut: Future<Output = Result<(), CrowdSenseError>> + Send + 'static,
    {
        self.ready_tx.send_replace(false);
        let ready_tx = self.ready_tx.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let label = name.to_string();

        let handle = tokio::spawn(async move {
            log::info!("Startup job {} starting", label);
            let started = Instant::now();
            tokio::select! {
                result = job => record_run(&label, result, started),
                _ = shutdown.changed() => log::warn!("Startup job {} interrupted by shutdown", label),
            }
            ready_tx.send_replace(true);
        });

        self.jobs.push((name.to_string(), handle));
    }

    /// Spawn a job running every `every`
    ///
    /// # Arguments
    /// * `name` - Label used in logs and metrics
    /// * `every` - Interval between run starts
    /// * `run_immediately` - First run as soon as the scheduler is ready instead of after one interval
    /// * `job` - Produces the future for one run
    pub fn spawn_job<F, Fut>(&mut self, name: &str, every: Duration, run_immediately: bool, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CrowdSenseError>> + Send + 'static,
    {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut ready = self.ready_tx.subscribe();
        let label = name.to_string();

        let handle = tokio::spawn(async move {
            let released = tokio::select! {
                res = async { ready.wait_for(|released| *released).await.map(|_| ()) } => res.is_ok(),
                _ = shutdown.changed() => false,
            };
            if !released || *shutdown.borrow() {
                log::info!("Job {} stopped before its first run", label);
                return;
            }

            let first = if run_immediately {
                Instant::now()
            } else {
                Instant::now() + every
            };
            let mut ticker = interval_at(first, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            log::info!("Job {} scheduled every {:?}", label, every);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }

                log::info!("Job {} starting", label);
                let started = Instant::now();
                tokio::select! {
                    result = job() => record_run(&label, result, started),
                    _ = shutdown.changed() => {
                        log::warn!("Job {} interrupted by shutdown", label);
                        break;
                    }
                }
            }

            log::info!("Job {} stopped", label);
        });

        self.jobs.push((name.to_string(), handle));
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Signal every loop to stop and wait for the tasks to exit
    pub async fn shutdown(self) {
        log::info!("Stopping {} scheduled jobs", self.jobs.len());
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in self.jobs {
            if let Err(e) = handle.await {
                log::error!("Job {} ended abnormally: {}", name, e);
            }
        }
    }
}

fn record_run(label: &str, result: Result<(), CrowdSenseError>, started: Instant) {
    let elapsed = started.elapsed();
    match &result {
        Ok(()) => log::info!("Job {} finished in {:.1}s", label, elapsed.as_secs_f64()),
        Err(e) => log::error!("Job {} failed after {:.1}s: {}", label, elapsed.as_secs_f64(), e),
    }
    metrics::record_job_run(label, result.is_ok(), elapsed);
}

/// Register the startup chain and the discovery, live refresh and weekly refresh jobs
/// DOCUMENTATION: With REFRESH_ON_STARTUP set, discovery, live refresh and weekly
/// refresh run once in that order before any interval starts counting. Every
/// interval job first fires one interval after that.
pub fn start_refresh_jobs(scheduler: &mut Scheduler, refresher: Arc<VenueRefresher>, config: &Config) {
    let fetch_live = config.discovery.fetch_live_after_upsert;

    if config.refresh_on_startup {
        let startup = refresher.clone();
        scheduler.spawn_startup("startup", async move {
            startup.run_startup_sequence(fetch_live).await
        });
    }

    let discovery = refresher.clone();
    scheduler.spawn_job("discovery", config.discovery_interval(), false, move || {
        let refresher = discovery.clone();
        async move {
            let stats = refresher.run_discovery(fetch_live).await;
            log::info!(
                "[run {}] Discovery upserted {} venues ({} errors)",
                stats.run_id,
                stats.venue_ids.len(),
                stats.errors.len()
            );
            Ok(())
        }
    });

    let live = refresher.clone();
    scheduler.spawn_job("live_refresh", config.live_refresh_interval(), false, move || {
        let refresher = live.clone();
        async move { refresher.forecasts().refresh_all_known().await.map(|_| ()) }
    });

    let weekly = refresher;
    scheduler.spawn_job("weekly_refresh", config.weekly_refresh_interval(), false, move || {
        let refresher = weekly.clone();
        async move { refresher.forecasts().refresh_weekly().await.map(|_| ()) }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::db::{InMemoryGeoStore, VenueCacheDao};
    use crate::models::{
        LiveForecast, VenueFilterResponse, VenueFilterVenue, WeekRawAnalysis, WeekRawDay,
        WeekRawResponse,
    };
    use crate::services::FixtureVenueDirectory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RunCounter {
        starts: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    fn counting_job(
        counter: Arc<RunCounter>,
        work: Duration,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<(), CrowdSenseError>> + Send>>
           + Send
           + Sync
           + 'static {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.starts.fetch_add(1, Ordering::SeqCst);
                let now = counter.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                counter.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(work).await;
                counter.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_never_overlaps_itself() {
        let counter = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_job(
            "slow",
            Duration::from_secs(10),
            true,
            counting_job(counter.clone(), Duration::from_secs(25)),
        );

        // runs start at 0s and 30s; the ticks at 10s and 20s are skipped
        tokio::time::sleep(Duration::from_secs(50)).await;

        assert_eq!(counter.starts.load(Ordering::SeqCst), 2);
        assert_eq!(counter.max_in_flight.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_first_run() {
        let counter = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_job(
            "delayed",
            Duration::from_secs(60),
            false,
            counting_job(counter.clone(), Duration::from_secs(1)),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_do_not_block_each_other() {
        let slow = Arc::new(RunCounter::default());
        let fast = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_job(
            "slow",
            Duration::from_secs(3600),
            true,
            counting_job(slow.clone(), Duration::from_secs(3000)),
        );
        scheduler.spawn_job(
            "fast",
            Duration::from_secs(10),
            true,
            counting_job(fast.clone(), Duration::from_secs(1)),
        );

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(slow.starts.load(Ordering::SeqCst), 1);
        assert_eq!(fast.starts.load(Ordering::SeqCst), 4);
        assert_eq!(scheduler.job_names(), vec!["slow", "fast"]);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loops_and_interrupts_runs() {
        let counter = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_job(
            "long",
            Duration::from_secs(5),
            true,
            counting_job(counter.clone(), Duration::from_secs(3600)),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.in_flight.load(Ordering::SeqCst), 1);

        // returns without waiting for the hour-long run
        scheduler.shutdown().await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_clock_starts_after_startup_job() {
        let counter = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_startup("startup", async {
            tokio::time::sleep(Duration::from_secs(100)).await;
            Ok(())
        });
        scheduler.spawn_job(
            "every_minute",
            Duration::from_secs(60),
            false,
            counting_job(counter.clone(), Duration::from_secs(1)),
        );

        // the startup job is still running at 61s, so no interval has elapsed yet
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 0);

        // released at 100s, first run at 160s
        tokio::time::sleep(Duration::from_secs(98)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);

        assert_eq!(scheduler.job_names(), vec!["startup", "every_minute"]);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_startup_job_still_releases_interval_jobs() {
        let counter = Arc::new(RunCounter::default());
        let mut scheduler = Scheduler::new();
        scheduler.spawn_startup("startup", async {
            Err(CrowdSenseError::ExternalApiError("API error 500: down".to_string()))
        });
        scheduler.spawn_job(
            "every_minute",
            Duration::from_secs(60),
            false,
            counting_job(counter.clone(), Duration::from_secs(1)),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    fn week_raw(days: &[i32]) -> WeekRawResponse {
        WeekRawResponse {
            venue_address: String::new(),
            window: Default::default(),
            status: "OK".to_string(),
            analysis: WeekRawAnalysis {
                week_raw: days
                    .iter()
                    .map(|d| WeekRawDay {
                        day_raw: vec![*d; 24],
                        day_int: *d,
                        day_info: None,
                    })
                    .collect(),
            },
            venue_name: String::new(),
            venue_id: "v1".to_string(),
        }
    }

    fn filtered_venue(id: &str) -> VenueFilterVenue {
        VenueFilterVenue {
            day_int: 4,
            day_raw: vec![10, 20],
            day_raw_whole: None,
            day_info: None,
            venue_address: String::new(),
            venue_lat: -8.06,
            venue_lng: -34.87,
            venue_id: id.to_string(),
            venue_name: "Bar Um".to_string(),
            venue_type: None,
            venue_dwell_time_min: None,
            venue_dwell_time_max: None,
            price_level: None,
            rating: None,
            reviews: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_weekly_forecasts_exist_right_after_boot() {
        let dao = VenueCacheDao::new(Arc::new(InMemoryGeoStore::new()));
        let fixture = FixtureVenueDirectory::new()
            .with_default_filter_response(VenueFilterResponse::ok(vec![filtered_venue("v1")]))
            .with_live_forecast("v1", LiveForecast::new("v1", "OK", 70, true))
            .with_week_raw("v1", week_raw(&[0, 1, 2, 3, 4, 5, 6]));

        let config = Config {
            refresh_on_startup: true,
            discovery: DiscoveryConfig::default(),
            ..Config::from_env()
        };
        let refresher = Arc::new(VenueRefresher::new(
            dao.clone(),
            Arc::new(fixture),
            config.discovery.clone(),
        ));

        let mut scheduler = Scheduler::new();
        start_refresh_jobs(&mut scheduler, refresher, &config);

        // far shorter than any refresh interval
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(dao.get_live_forecast("v1").await.unwrap().is_some());
        for day in 0..7 {
            assert!(dao.get_week_raw_forecast("v1", day).await.unwrap().is_some());
        }
        assert_eq!(
            scheduler.job_names(),
            vec!["startup", "discovery", "live_refresh", "weekly_refresh"]
        );
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_startup_chain_when_disabled() {
        let dao = VenueCacheDao::new(Arc::new(InMemoryGeoStore::new()));
        let fixture = FixtureVenueDirectory::new()
            .with_default_filter_response(VenueFilterResponse::ok(vec![filtered_venue("v1")]));

        let config = Config {
            refresh_on_startup: false,
            discovery: DiscoveryConfig::default(),
            ..Config::from_env()
        };
        let refresher = Arc::new(VenueRefresher::new(
            dao.clone(),
            Arc::new(fixture),
            config.discovery.clone(),
        ));

        let mut scheduler = Scheduler::new();
        start_refresh_jobs(&mut scheduler, refresher, &config);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(dao.list_all_venue_ids().await.unwrap().is_empty());
        assert_eq!(
            scheduler.job_names(),
            vec!["discovery", "live_refresh", "weekly_refresh"]
        );
        scheduler.shutdown().await;
    }
}
