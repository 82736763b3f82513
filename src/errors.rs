// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for cache, provider and HTTP layers

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Application-specific error types
/// DOCUMENTATION: One enum for store, provider and request failures
/// Each variant maps to an HTTP status code and error response
#[derive(Error, Debug)]
pub enum CrowdSenseError {
    #[error("Cache store error: {0}")]
    StoreError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl CrowdSenseError {
    fn code(&self) -> &'static str {
        match self {
            CrowdSenseError::StoreError(_) => "STORE_ERROR",
            CrowdSenseError::SerializationError(_) => "SERIALIZATION_ERROR",
            CrowdSenseError::InvalidInput(_) => "INVALID_INPUT",
            CrowdSenseError::ValidationError(_) => "VALIDATION_ERROR",
            CrowdSenseError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            CrowdSenseError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            CrowdSenseError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl From<serde_json::Error> for CrowdSenseError {
    fn from(e: serde_json::Error) -> Self {
        CrowdSenseError::SerializationError(e.to_string())
    }
}

impl From<sqlx::Error> for CrowdSenseError {
    fn from(e: sqlx::Error) -> Self {
        CrowdSenseError::StoreError(e.to_string())
    }
}

impl From<reqwest::Error> for CrowdSenseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CrowdSenseError::ExternalApiError(format!("Request timed out: {}", e))
        } else {
            CrowdSenseError::ExternalApiError(format!("Request failed: {}", e))
        }
    }
}

/// Convert CrowdSenseError to HTTP response
/// DOCUMENTATION: Store and serialization failures surface as 500s,
/// bad query parameters as 400s, a missing metrics exporter as 503
impl ResponseError for CrowdSenseError {
    fn error_response(&self) -> HttpResponse {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CrowdSenseError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrowdSenseError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrowdSenseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CrowdSenseError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CrowdSenseError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            CrowdSenseError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            CrowdSenseError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_internal() {
        let err = CrowdSenseError::StoreError("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = CrowdSenseError::SerializationError("bad json".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = CrowdSenseError::ValidationError("lat out of range".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_unavailable_exporter_is_503() {
        let err = CrowdSenseError::ServiceUnavailable("metrics recorder not installed".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: CrowdSenseError = parse.unwrap_err().into();
        assert!(matches!(err, CrowdSenseError::SerializationError(_)));
    }
}
