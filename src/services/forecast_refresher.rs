// src/services/forecast_refresher.rs
// DOCUMENTATION: Live and weekly forecast refresh
// PURPOSE: Keep forecast caches in step with the provider for venues already in the geo cache

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::besttime_client::VenueDirectory;
use crate::db::VenueCacheDao;
use crate::errors::CrowdSenseError;

/// Forecast refresh statistics
/// DOCUMENTATION: Counters for one live or weekly refresh run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastStats {
    /// Venue IDs processed
    pub venues_processed: u32,
    /// Live forecasts written to the cache
    pub live_cached: u32,
    /// Live entries removed because the provider had no live data
    pub live_invalidated: u32,
    /// Weekly day entries written
    pub weekly_days_cached: u32,
    /// Venues whose weekly forecast was not OK
    pub weekly_skipped: u32,
    /// Provider or store failures
    pub failures: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub completed_at: Option<String>,
}

impl ForecastStats {
    fn fail(&mut self, message: String) {
        log::error!("{}", message);
        self.failures += 1;
        self.errors.push(message);
    }

    fn complete(&mut self, started: Instant) {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.completed_at = Some(Utc::now().to_rfc3339());
    }

    /// Fold another run's counters into this one
    pub fn absorb(&mut self, other: ForecastStats) {
        self.venues_processed += other.venues_processed;
        self.live_cached += other.live_cached;
        self.live_invalidated += other.live_invalidated;
        self.weekly_days_cached += other.weekly_days_cached;
        self.weekly_skipped += other.weekly_skipped;
        self.failures += other.failures;
        self.errors.extend(other.errors);
    }
}

/// Refreshes live and weekly forecasts of cached venues
/// DOCUMENTATION: A provider error for one venue is logged and skipped;
/// failing to list the cached IDs is returned to the caller
#[derive(Clone)]
pub struct ForecastRefresher {
    dao: VenueCacheDao,
    directory: Arc<dyn VenueDirectory>,
}

impl ForecastRefresher {
    pub fn new(dao: VenueCacheDao, directory: Arc<dyn VenueDirectory>) -> Self {
        Self { dao, directory }
    }

    /// Refresh live forecasts of every venue in the geo cache
    pub async fn refresh_all_known(&self) -> Result<ForecastStats, CrowdSenseError> {
        let ids = self.dao.list_all_venue_ids().await.map_err(|e| {
            log::error!("Listing venue ids failed: {}", e);
            e
        })?;

        log::info!("Found {} venues in geo cache; refreshing live forecasts", ids.len());
        Ok(self.refresh_ids(&ids).await)
    }

    /// Refresh only venues that currently hold a live entry
    pub async fn refresh_cached(&self) -> Result<ForecastStats, CrowdSenseError> {
        let ids = self.dao.list_cached_live_forecast_venue_ids().await?;
        log::info!("Refreshing {} cached live forecasts", ids.len());
        Ok(self.refresh_ids(&ids).await)
    }

    /// Fetch and apply the live forecast of each ID
    /// DOCUMENTATION: OK responses with live data are cached, anything else removes the entry
    pub async fn refresh_ids(&self, ids: &[String]) -> ForecastStats {
        let started = Instant::now();
        let mut stats = ForecastStats::default();

        for id in ids {
            stats.venues_processed += 1;

            let forecast = match self.directory.get_live_forecast(id).await {
                Ok(forecast) => forecast,
                Err(e) => {
                    stats.fail(format!("Live forecast fetch failed for {}: {}", id, e));
                    continue;
                }
            };

            if !forecast.is_cacheable() {
                if forecast.status != "OK" {
                    log::warn!(
                        "Live forecast status {:?} for {}, removing cache entry",
                        forecast.status,
                        id
                    );
                } else {
                    log::info!("No live data for {} (maybe closed), removing cache entry", id);
                }

                match self.dao.delete_live_forecast(id).await {
                    Ok(()) => stats.live_invalidated += 1,
                    Err(e) => stats.fail(format!("Failed to delete live forecast for {}: {}", id, e)),
                }
                continue;
            }

            match self.dao.set_live_forecast(&forecast).await {
                Ok(()) => {
                    log::debug!("Live forecast cached for {}", id);
                    stats.live_cached += 1;
                }
                Err(e) => stats.fail(format!("Failed to cache live forecast for {}: {}", id, e)),
            }
        }

        stats.complete(started);
        log::info!(
            "Live refresh done: {} cached, {} invalidated, {} failed of {}",
            stats.live_cached,
            stats.live_invalidated,
            stats.failures,
            stats.venues_processed
        );
        stats
    }

    /// Refresh the weekly raw forecast of every venue in the geo cache
    pub async fn refresh_weekly(&self) -> Result<ForecastStats, CrowdSenseError> {
        let started = Instant::now();
        let ids = self.dao.list_all_venue_ids().await.map_err(|e| {
            log::error!("Listing venue ids for weekly refresh failed: {}", e);
            e
        })?;

        log::info!("Found {} venues; refreshing weekly forecasts", ids.len());
        let mut stats = ForecastStats::default();

        for id in &ids {
            stats.venues_processed += 1;

            let response = match self.directory.get_week_raw_forecast(id).await {
                Ok(response) => response,
                Err(e) => {
                    stats.fail(format!("Weekly forecast fetch failed for {}: {}", id, e));
                    continue;
                }
            };

            if response.status != "OK" {
                log::warn!(
                    "Weekly forecast status {:?} for {}, skipping cache",
                    response.status,
                    id
                );
                stats.weekly_skipped += 1;
                continue;
            }

            let total = response.analysis.week_raw.len();
            let mut cached = 0;
            for day in &response.analysis.week_raw {
                match self.dao.set_week_raw_forecast(id, day).await {
                    Ok(()) => cached += 1,
                    Err(e) => stats.fail(format!(
                        "Failed to cache weekly forecast for {} day {}: {}",
                        id, day.day_int, e
                    )),
                }
            }

            stats.weekly_days_cached += cached;
            log::info!("Cached {} of {} weekly days for {}", cached, total, id);
        }

        stats.complete(started);
        log::info!("Weekly forecast refresh finished");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GeoCacheStore, InMemoryGeoStore};
    use crate::models::{LiveForecast, Venue, WeekRawAnalysis, WeekRawDay, WeekRawResponse};
    use crate::services::FixtureVenueDirectory;

    async fn seeded_dao(ids: &[&str]) -> VenueCacheDao {
        let dao = VenueCacheDao::new(Arc::new(InMemoryGeoStore::new()));
        for id in ids {
            dao.upsert_venue(&Venue::new(id, id, -8.06, -34.87))
                .await
                .unwrap();
        }
        dao
    }

    fn week(status: &str, days: &[i32]) -> WeekRawResponse {
        WeekRawResponse {
            venue_address: String::new(),
            window: Default::default(),
            status: status.to_string(),
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
            venue_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_live_caching_rule() {
        let dao = seeded_dao(&["ok", "closed", "error"]).await;
        // stale entries that must disappear
        dao.set_live_forecast(&LiveForecast::new("closed", "OK", 10, true))
            .await
            .unwrap();
        dao.set_live_forecast(&LiveForecast::new("error", "OK", 10, true))
            .await
            .unwrap();

        let fixture = FixtureVenueDirectory::new()
            .with_live_forecast("ok", LiveForecast::new("ok", "OK", 70, true))
            .with_live_forecast("closed", LiveForecast::new("closed", "OK", 0, false))
            .with_live_forecast("error", LiveForecast::new("error", "Error", 0, false));

        let refresher = ForecastRefresher::new(dao.clone(), Arc::new(fixture));
        let stats = refresher.refresh_all_known().await.unwrap();

        assert_eq!(stats.live_cached, 1);
        assert_eq!(stats.live_invalidated, 2);
        assert_eq!(stats.failures, 0);

        let cached = dao.get_live_forecast("ok").await.unwrap().unwrap();
        assert_eq!(cached.analysis.venue_live_busyness, 70);
        assert!(dao.get_live_forecast("closed").await.unwrap().is_none());
        assert!(dao.get_live_forecast("error").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_error_skips_venue() {
        let dao = seeded_dao(&["a", "b"]).await;
        let fixture =
            FixtureVenueDirectory::new().with_live_forecast("b", LiveForecast::new("b", "OK", 20, true));

        let refresher = ForecastRefresher::new(dao.clone(), Arc::new(fixture));
        let stats = refresher.refresh_all_known().await.unwrap();

        assert_eq!(stats.venues_processed, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.live_cached, 1);
        assert!(dao.get_live_forecast("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_cached_only_touches_live_entries() {
        let dao = seeded_dao(&["a", "b"]).await;
        dao.set_live_forecast(&LiveForecast::new("a", "OK", 10, true))
            .await
            .unwrap();

        let fixture = Arc::new(
            FixtureVenueDirectory::new().with_live_forecast("a", LiveForecast::new("a", "OK", 15, true)),
        );
        let refresher = ForecastRefresher::new(dao.clone(), fixture.clone());
        refresher.refresh_cached().await.unwrap();

        assert_eq!(fixture.calls().await, vec!["live:a"]);
        let cached = dao.get_live_forecast("a").await.unwrap().unwrap();
        assert_eq!(cached.analysis.venue_live_busyness, 15);
    }

    #[tokio::test]
    async fn test_weekly_refresh_caches_each_day() {
        let dao = seeded_dao(&["a", "b"]).await;
        let fixture = FixtureVenueDirectory::new()
            .with_week_raw("a", week("OK", &[0, 1, 2, 3, 4, 5, 6]))
            .with_week_raw("b", week("Error", &[0]));

        let refresher = ForecastRefresher::new(dao.clone(), Arc::new(fixture));
        let stats = refresher.refresh_weekly().await.unwrap();

        assert_eq!(stats.weekly_days_cached, 7);
        assert_eq!(stats.weekly_skipped, 1);

        let sunday = dao.get_week_raw_forecast("a", 6).await.unwrap().unwrap();
        assert_eq!(sunday.day_raw.len(), 24);
        assert!(dao.get_week_raw_forecast("b", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        struct BrokenStore;

        #[async_trait::async_trait]
        impl GeoCacheStore for BrokenStore {
            async fn set(&self, _: &str, _: &str) -> Result<(), CrowdSenseError> {
                Ok(())
            }
            async fn get(&self, _: &str) -> Result<Option<String>, CrowdSenseError> {
                Ok(None)
            }
            async fn delete(&self, _: &str) -> Result<(), CrowdSenseError> {
                Ok(())
            }
            async fn list_keys(&self, _: &str) -> Result<Vec<String>, CrowdSenseError> {
                Err(CrowdSenseError::StoreError("connection refused".to_string()))
            }
            async fn add_location_with_payload(
                &self,
                _: &str,
                _: &str,
                _: f64,
                _: f64,
                _: &str,
            ) -> Result<(), CrowdSenseError> {
                Ok(())
            }
            async fn find_within_radius(
                &self,
                _: &str,
                _: f64,
                _: f64,
                _: f64,
            ) -> Result<Vec<String>, CrowdSenseError> {
                Ok(Vec::new())
            }
        }

        let dao = VenueCacheDao::new(Arc::new(BrokenStore));
        let refresher = ForecastRefresher::new(dao, Arc::new(FixtureVenueDirectory::new()));

        assert!(matches!(
            refresher.refresh_all_known().await,
            Err(CrowdSenseError::StoreError(_))
        ));
        assert!(refresher.refresh_weekly().await.is_err());
    }
}
