// src/handlers/venues.rs
// DOCUMENTATION: HTTP handlers for venue queries
// PURPOSE: Parse requests, call the venue service, return responses

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use validator::Validate;

use crate::errors::CrowdSenseError;
use crate::services::VenueService;

/// Query parameters for GET /v1/venues/nearby
#[derive(Debug, Deserialize, Validate)]
pub struct NearbyQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,

    /// Search radius in kilometers, must be positive
    pub radius: f64,

    #[serde(default)]
    pub verbose: bool,
}

impl NearbyQuery {
    fn check(&self) -> Result<(), CrowdSenseError> {
        self.validate()
            .map_err(|e| CrowdSenseError::ValidationError(e.to_string()))?;

        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(CrowdSenseError::ValidationError(format!(
                "radius must be greater than 0, got {}",
                self.radius
            )));
        }
        Ok(())
    }
}

/// GET /v1/venues/nearby
/// Venues around a point with live and weekly forecasts, busiest live venues first
pub async fn get_venues_nearby(
    service: web::Data<VenueService>,
    query: web::Query<NearbyQuery>,
) -> Result<impl Responder, CrowdSenseError> {
    query.check()?;

    let venues = service
        .get_venues_nearby(query.lat, query.lon, query.radius, query.verbose)
        .await
        .map_err(|e| {
            log::error!("Nearby venues query failed: {}", e);
            e
        })?;

    log::info!("Returning {} venues", venues.len());
    Ok(HttpResponse::Ok().json(venues))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        CrowdSenseError::InvalidInput(err.to_string()).into()
    }))
    .service(web::scope("/v1/venues").route("/nearby", web::get().to(get_venues_nearby)));
}
