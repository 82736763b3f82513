// src/services/venue_service.rs
// DOCUMENTATION: Business logic for nearby venue queries
// PURPOSE: Intermediary between handlers and the venue cache; merges, sorts and shapes results

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use serde::Serialize;
use std::cmp::Reverse;

use crate::db::VenueCacheDao;
use crate::errors::CrowdSenseError;
use crate::models::{MinifiedVenue, Venue, VenueWithLive};

/// Nearby venues in the requested shape
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NearbyVenues {
    Verbose(Vec<VenueWithLive>),
    Minified(Vec<MinifiedVenue>),
}

impl NearbyVenues {
    pub fn len(&self) -> usize {
        match self {
            NearbyVenues::Verbose(v) => v.len(),
            NearbyVenues::Minified(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct VenueService {
    dao: VenueCacheDao,
    /// Serving timezone used to pick "today" for weekly forecasts
    offset: FixedOffset,
}

impl VenueService {
    /// Create the service; out-of-range offsets fall back to UTC
    pub fn new(dao: VenueCacheDao, utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| {
            log::warn!("Invalid UTC offset {}h, serving in UTC", utc_offset_hours);
            Utc.fix()
        });
        Self { dao, offset }
    }

    /// Nearby venues merged with live and weekly data, live venues first
    /// DOCUMENTATION: Store failures or corrupt venue payloads fail the request
    ///
    /// # Arguments
    /// * `lat`, `lon` - Search center
    /// * `radius_km` - Search radius in kilometers
    /// * `verbose` - Full merged records instead of minified ones
    pub async fn get_venues_nearby(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        verbose: bool,
    ) -> Result<NearbyVenues, CrowdSenseError> {
        log::info!(
            "GetVenuesNearby: lat={:.6}, lon={:.6}, radius={:.2}km, verbose={}",
            lat,
            lon,
            radius_km,
            verbose
        );

        let venues = self.dao.get_nearby_venues(lat, lon, radius_km).await?;
        log::info!("Found {} nearby venues", venues.len());

        let day_int = day_index(Utc::now(), self.offset);
        let mut merged = self.merge(venues, day_int).await;
        sort_by_live_busyness(&mut merged);

        Ok(transform(merged, verbose))
    }

    /// Attach live and weekly entries; lookup failures count as missing data
    async fn merge(&self, venues: Vec<Venue>, day_int: i32) -> Vec<VenueWithLive> {
        let mut out = Vec::with_capacity(venues.len());

        for venue in venues {
            let live_forecast = match self.dao.get_live_forecast(&venue.venue_id).await {
                Ok(lf) => lf,
                Err(e) => {
                    log::debug!("No live forecast for {}: {}", venue.venue_id, e);
                    None
                }
            };

            let weekly_forecast = match self.dao.get_week_raw_forecast(&venue.venue_id, day_int).await {
                Ok(day) => day,
                Err(e) => {
                    log::debug!(
                        "No weekly forecast for {} day {}: {}",
                        venue.venue_id,
                        day_int,
                        e
                    );
                    None
                }
            };

            out.push(VenueWithLive {
                venue,
                live_forecast,
                weekly_forecast,
            });
        }

        out
    }
}

/// Day of week in the serving timezone, Monday = 0 .. Sunday = 6
pub fn day_index(now: DateTime<Utc>, offset: FixedOffset) -> i32 {
    now.with_timezone(&offset).weekday().num_days_from_monday() as i32
}

/// Stable sort: venues with a live entry first by busyness descending, then the rest
/// in their original order
pub fn sort_by_live_busyness(venues: &mut [VenueWithLive]) {
    venues.sort_by_key(|v| match &v.live_forecast {
        Some(lf) => (0, Reverse(lf.analysis.venue_live_busyness)),
        None => (1, Reverse(0)),
    });
}

pub fn transform(merged: Vec<VenueWithLive>, verbose: bool) -> NearbyVenues {
    if verbose {
        NearbyVenues::Verbose(merged)
    } else {
        NearbyVenues::Minified(merged.into_iter().map(MinifiedVenue::from).collect())
    }
}
