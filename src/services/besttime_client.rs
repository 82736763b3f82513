// src/services/besttime_client.rs
// DOCUMENTATION: BestTime API client
// PURPOSE: Venue discovery and busyness forecasts from the external venue directory

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, SeedLocation};
use crate::errors::CrowdSenseError;
use crate::metrics;
use crate::models::{
    JobHandle, LiveForecast, SearchProgress, Venue, VenueFilterParams, VenueFilterResponse,
    WeekRawResponse,
};

/// Free-text query used by the background search
const SEARCH_QUERY: &str =
    "most popular bars, nightclubs or pubs to party and dance in recife and are open now";

/// External venue directory operations used by the refreshers
/// DOCUMENTATION: Every call may fail; callers log and skip
#[async_trait]
pub trait VenueDirectory: Send + Sync {
    /// Kick off a background venue search around a seed
    async fn start_search(&self, seed: &SeedLocation) -> Result<JobHandle, CrowdSenseError>;

    /// Poll a background search job
    async fn poll_progress(
        &self,
        job_id: &str,
        collection_id: &str,
    ) -> Result<SearchProgress, CrowdSenseError>;

    /// Fetch a single venue with its weekly foot traffic
    async fn get_venue(&self, venue_id: &str) -> Result<Venue, CrowdSenseError>;

    /// Fetch the live busyness snapshot of a venue
    async fn get_live_forecast(&self, venue_id: &str) -> Result<LiveForecast, CrowdSenseError>;

    /// Run a synchronous filter query
    async fn run_filtered_search(
        &self,
        params: &VenueFilterParams,
    ) -> Result<VenueFilterResponse, CrowdSenseError>;

    /// Fetch the raw weekly forecast of a venue
    async fn get_week_raw_forecast(&self, venue_id: &str)
        -> Result<WeekRawResponse, CrowdSenseError>;
}

/// BestTime HTTP client
/// DOCUMENTATION: Private key for search/progress/filter/live, public key for
/// venue lookup and weekly forecasts. A process-wide limiter spaces out requests.
pub struct BestTimeClient {
    client: Client,
    base_url: String,
    api_key_public: String,
    api_key_private: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl BestTimeClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. https://besttime.app/api/v1
    /// * `timeout` - Per-request timeout
    /// * `requests_per_second` - Request quota; 0 is treated as 1
    pub fn new(
        base_url: &str,
        api_key_public: String,
        api_key_private: String,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, CrowdSenseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrowdSenseError::ExternalApiError(format!("Client build failed: {}", e)))?;

        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_public,
            api_key_private,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, CrowdSenseError> {
        Self::new(
            &config.besttime_base_url,
            config.besttime_public_key.clone(),
            config.besttime_private_key.clone(),
            Duration::from_secs(config.besttime_timeout_secs),
            config.besttime_requests_per_second,
        )
    }

    /// Send a request and decode the JSON body
    /// DOCUMENTATION: Non-2xx responses and undecodable bodies become ExternalApiError.
    /// Every call is counted and timed under `route`, the endpoint template.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &'static str,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, CrowdSenseError> {
        self.limiter.until_ready().await;

        let started = Instant::now();
        let result = self.send(method, endpoint, params).await;
        metrics::record_besttime_call(route, result.as_ref().map(|_| ()), started.elapsed());
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, CrowdSenseError> {
        let url = format!("{}{}", self.base_url, endpoint);
        log::debug!("BestTime {} {} ({} params)", method, endpoint, params.len());

        let response = self
            .client
            .request(method.clone(), &url)
            .query(params)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                log::error!("BestTime request {} {} failed: {}", method, endpoint, e);
                CrowdSenseError::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("BestTime API error {} on {}: {}", status, endpoint, body);

            if status.as_u16() == 429 {
                return Err(CrowdSenseError::RateLimitExceeded);
            }
            return Err(CrowdSenseError::ExternalApiError(format!(
                "API error {}: {}",
                status, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            log::error!("Failed to parse BestTime response from {}: {}", endpoint, e);
            CrowdSenseError::ExternalApiError(format!("Parse error: {}", e))
        })
    }

    fn private_key_param(&self) -> (String, String) {
        ("api_key_private".to_string(), self.api_key_private.clone())
    }

    fn public_key_param(&self) -> (String, String) {
        ("api_key_public".to_string(), self.api_key_public.clone())
    }
}

/// Query parameters for a background search around a seed
fn search_params(seed: &SeedLocation) -> Vec<(String, String)> {
    vec![
        ("q".to_string(), SEARCH_QUERY.to_string()),
        ("num".to_string(), seed.limit.to_string()),
        ("lat".to_string(), seed.lat.to_string()),
        ("lng".to_string(), seed.lng.to_string()),
        ("opened".to_string(), "now".to_string()),
        ("radius".to_string(), seed.radius_m.to_string()),
        ("live".to_string(), "true".to_string()),
    ]
}

#[async_trait]
impl VenueDirectory for BestTimeClient {
    async fn start_search(&self, seed: &SeedLocation) -> Result<JobHandle, CrowdSenseError> {
        let mut params = search_params(seed);
        params.push(self.private_key_param());

        let handle: JobHandle = self.request(Method::POST, "/venues/search", "/venues/search", &params).await?;
        log::info!(
            "Started venue search job {} (collection {}) at ({}, {})",
            handle.job_id,
            handle.collection_id,
            seed.lat,
            seed.lng
        );
        Ok(handle)
    }

    async fn poll_progress(
        &self,
        job_id: &str,
        collection_id: &str,
    ) -> Result<SearchProgress, CrowdSenseError> {
        let mut params = vec![("job_id".to_string(), job_id.to_string())];
        if !collection_id.is_empty() {
            params.push(("collection_id".to_string(), collection_id.to_string()));
        }
        params.push(self.private_key_param());

        self.request(Method::GET, "/venues/progress", "/venues/progress", &params).await
    }

    async fn get_venue(&self, venue_id: &str) -> Result<Venue, CrowdSenseError> {
        if venue_id.is_empty() {
            return Err(CrowdSenseError::InvalidInput("venue_id must be provided".to_string()));
        }

        let endpoint = format!("/venues/{}", venue_id);
        self.request(Method::GET, "/venues/{venue_id}", &endpoint, &[self.public_key_param()])
            .await
    }

    async fn get_live_forecast(&self, venue_id: &str) -> Result<LiveForecast, CrowdSenseError> {
        if venue_id.is_empty() {
            return Err(CrowdSenseError::InvalidInput("venue_id must be provided".to_string()));
        }

        let params = vec![
            self.private_key_param(),
            ("venue_id".to_string(), venue_id.to_string()),
        ];
        self.request(Method::POST, "/forecasts/live", "/forecasts/live", &params).await
    }

    async fn run_filtered_search(
        &self,
        params: &VenueFilterParams,
    ) -> Result<VenueFilterResponse, CrowdSenseError> {
        let mut query = params.to_query_params();
        query.push(self.private_key_param());

        log::info!("Calling venue filter with {} params", query.len());
        let response: VenueFilterResponse =
            self.request(Method::GET, "/venues/filter", "/venues/filter", &query).await?;

        log::info!(
            "Venue filter returned status={} venues_n={}",
            response.status,
            response.venues_n
        );
        Ok(response)
    }

    async fn get_week_raw_forecast(
        &self,
        venue_id: &str,
    ) -> Result<WeekRawResponse, CrowdSenseError> {
        if venue_id.is_empty() {
            return Err(CrowdSenseError::InvalidInput("venue_id must be provided".to_string()));
        }

        let params = vec![
            self.public_key_param(),
            ("venue_id".to_string(), venue_id.to_string()),
        ];
        self.request(Method::GET, "/forecasts/week/raw2", "/forecasts/week/raw2", &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BestTimeClient {
        BestTimeClient::new(
            "https://besttime.app/api/v1/",
            "pub_key".to_string(),
            "pri_key".to_string(),
            Duration::from_secs(10),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_is_normalized() {
        assert_eq!(client().base_url, "https://besttime.app/api/v1");
    }

    #[test]
    fn test_key_params() {
        let c = client();
        assert_eq!(c.private_key_param().1, "pri_key");
        assert_eq!(c.public_key_param().0, "api_key_public");
    }

    #[test]
    fn test_search_params_use_seed() {
        let seed = SeedLocation::new(-8.05, -34.88, 3000, 40);
        let params = search_params(&seed);

        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("radius").as_deref(), Some("3000"));
        assert_eq!(get("num").as_deref(), Some("40"));
        assert_eq!(get("lat").as_deref(), Some("-8.05"));
        assert_eq!(get("live").as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_empty_venue_id_is_rejected_without_request() {
        let c = client();
        let result = c.get_live_forecast("").await;
        assert!(matches!(result, Err(CrowdSenseError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_failed_call_is_recorded_under_route_template() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        // nothing listens on port 1
        let c = BestTimeClient::new(
            "http://127.0.0.1:1",
            "pub_key".to_string(),
            "pri_key".to_string(),
            Duration::from_secs(2),
            0,
        )
        .unwrap();
        assert!(c.get_venue("ven_abc123").await.is_err());

        let output = handle.render();
        assert!(output.contains(
            r#"besttime_api_calls_total{endpoint="/venues/{venue_id}",status="error"} 1"#
        ));
        assert!(output.contains(r#"besttime_api_errors_total{endpoint="/venues/{venue_id}""#));
        assert!(!output.contains("ven_abc123"));
    }
}
