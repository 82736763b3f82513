// src/metrics.rs
// DOCUMENTATION: Prometheus metrics
// PURPOSE: Provider call, background job and HTTP request metrics plus the exporter handle

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use crate::errors::CrowdSenseError;

pub const BESTTIME_API_CALLS_TOTAL: &str = "besttime_api_calls_total";
pub const BESTTIME_API_CALL_DURATION_SECONDS: &str = "besttime_api_call_duration_seconds";
pub const BESTTIME_API_ERRORS_TOTAL: &str = "besttime_api_errors_total";
pub const BACKGROUND_JOB_RUNS_TOTAL: &str = "background_job_runs_total";
pub const BACKGROUND_JOB_DURATION_SECONDS: &str = "background_job_duration_seconds";
pub const BACKGROUND_JOB_LAST_RUN_TIMESTAMP: &str = "background_job_last_run_timestamp_seconds";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

const HTTP_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const BESTTIME_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];
const JOB_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            HTTP_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(BESTTIME_API_CALL_DURATION_SECONDS.to_string()),
            BESTTIME_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(BACKGROUND_JOB_DURATION_SECONDS.to_string()),
            JOB_BUCKETS,
        )
}

/// Install the global Prometheus recorder
/// DOCUMENTATION: Idempotent; returns the render handle, or None when another
/// recorder was already installed
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }

    match builder().and_then(PrometheusBuilder::install_recorder) {
        Ok(handle) => {
            log::info!("Prometheus recorder installed");
            Some(HANDLE.get_or_init(|| handle).clone())
        }
        Err(e) => {
            log::warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Error label for a failed provider call
pub fn error_type(err: &CrowdSenseError) -> &'static str {
    match err {
        CrowdSenseError::RateLimitExceeded => "rate_limited",
        CrowdSenseError::ExternalApiError(msg) if msg.starts_with("Request timed out") => "timeout",
        CrowdSenseError::ExternalApiError(msg) if msg.starts_with("Request failed") => {
            "connection_error"
        }
        CrowdSenseError::ExternalApiError(msg) if msg.starts_with("Parse error") => "parse_error",
        CrowdSenseError::ExternalApiError(_) => "http_error",
        _ => "other",
    }
}

/// Record one BestTime call; `endpoint` is the route template, never a concrete venue path
pub fn record_besttime_call(
    endpoint: &'static str,
    result: Result<(), &CrowdSenseError>,
    elapsed: Duration,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    counter!(BESTTIME_API_CALLS_TOTAL, "endpoint" => endpoint, "status" => status).increment(1);
    histogram!(BESTTIME_API_CALL_DURATION_SECONDS, "endpoint" => endpoint)
        .record(elapsed.as_secs_f64());

    if let Err(e) = result {
        counter!(BESTTIME_API_ERRORS_TOTAL, "endpoint" => endpoint, "error_type" => error_type(e))
            .increment(1);
    }
}

pub fn record_job_run(job_name: &str, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "error" };
    counter!(BACKGROUND_JOB_RUNS_TOTAL, "job_name" => job_name.to_string(), "status" => status)
        .increment(1);
    histogram!(BACKGROUND_JOB_DURATION_SECONDS, "job_name" => job_name.to_string())
        .record(elapsed.as_secs_f64());

    if success {
        gauge!(BACKGROUND_JOB_LAST_RUN_TIMESTAMP, "job_name" => job_name.to_string())
            .set(chrono::Utc::now().timestamp() as f64);
    }
}

pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, elapsed: Duration) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(record: impl FnOnce()) -> String {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    #[test]
    fn test_besttime_calls_are_labelled_by_outcome() {
        let timeout = CrowdSenseError::ExternalApiError("Request timed out: deadline".to_string());
        let output = render_with(|| {
            record_besttime_call("/forecasts/live", Ok(()), Duration::from_millis(120));
            record_besttime_call("/forecasts/live", Err(&timeout), Duration::from_secs(10));
        });

        assert!(output.contains(
            r#"besttime_api_calls_total{endpoint="/forecasts/live",status="success"} 1"#
        ));
        assert!(output.contains(
            r#"besttime_api_calls_total{endpoint="/forecasts/live",status="error"} 1"#
        ));
        assert!(output.contains(
            r#"besttime_api_errors_total{endpoint="/forecasts/live",error_type="timeout"} 1"#
        ));
        assert!(output.contains("besttime_api_call_duration_seconds_bucket"));
    }

    #[test]
    fn test_job_runs_and_last_success() {
        let output = render_with(|| {
            record_job_run("weekly_refresh", true, Duration::from_secs(42));
            record_job_run("live_refresh", false, Duration::from_secs(3));
        });

        assert!(output.contains(
            r#"background_job_runs_total{job_name="weekly_refresh",status="success"} 1"#
        ));
        assert!(output.contains(
            r#"background_job_runs_total{job_name="live_refresh",status="error"} 1"#
        ));
        assert!(output.contains(r#"background_job_last_run_timestamp_seconds{job_name="weekly_refresh"}"#));
        assert!(!output.contains(r#"background_job_last_run_timestamp_seconds{job_name="live_refresh"}"#));
    }

    #[test]
    fn test_http_requests_use_route_template() {
        let output = render_with(|| {
            record_http_request("GET", "/v1/venues/nearby", 400, Duration::from_millis(2));
        });

        assert!(output.contains(
            r#"http_requests_total{method="GET",endpoint="/v1/venues/nearby",status_code="400"} 1"#
        ));
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(error_type(&CrowdSenseError::RateLimitExceeded), "rate_limited");
        assert_eq!(
            error_type(&CrowdSenseError::ExternalApiError("API error 500: boom".to_string())),
            "http_error"
        );
        assert_eq!(
            error_type(&CrowdSenseError::ExternalApiError("Parse error: eof".to_string())),
            "parse_error"
        );
        assert_eq!(
            error_type(&CrowdSenseError::InvalidInput("empty id".to_string())),
            "other"
        );
    }
}
