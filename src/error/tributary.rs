use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::IsRetryable;

#[derive(Debug, ThisError)]
pub enum TributaryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Resource is not initialized")]
    NotInitialized,

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        /// Id of the already-registered plan, when one is known.
        plan_id: Option<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error with status {status} from {url}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Upstream payload error: {0}")]
    UpstreamPayload(String),

    #[error("Partial page failure for {item}: {message}")]
    PartialPage { item: String, message: String },

    #[error("Content sink error: {0}")]
    Sink(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl TributaryError {
    pub fn conflict(message: impl Into<String>, plan_id: Option<String>) -> Self {
        TributaryError::Conflict {
            message: message.into(),
            plan_id,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        TributaryError::InvalidConfiguration(message.into())
    }
}

impl IntoResponse for TributaryError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            TributaryError::InvalidConfiguration(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "INVALID_CONFIGURATION".to_string(),
                    message,
                    details: None,
                },
            ),

            TributaryError::NotInitialized => (
                StatusCode::PRECONDITION_FAILED,
                ApiErrorObject {
                    code: "NOT_INITIALIZED".to_string(),
                    message: "Resource has not been initialized.".to_string(),
                    details: None,
                },
            ),

            TributaryError::Conflict { message, plan_id } => (
                StatusCode::CONFLICT,
                ApiErrorObject {
                    code: "CONFLICT".to_string(),
                    message,
                    details: plan_id.map(|id| serde_json::json!({ "planId": id })),
                },
            ),

            TributaryError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject {
                    code: "NOT_FOUND".to_string(),
                    message,
                    details: None,
                },
            ),

            TributaryError::UpstreamStatus { .. }
            | TributaryError::UpstreamPayload(_)
            | TributaryError::PartialPage { .. }
            | TributaryError::ReqwestError(_)
            | TributaryError::Sink(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                },
            ),

            TributaryError::JsonError(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "BAD_PAYLOAD".to_string(),
                    message: "Failed to parse payload.".to_string(),
                    details: None,
                },
            ),

            TributaryError::DatabaseError(_)
            | TributaryError::RactorError(_)
            | TributaryError::UrlError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for TributaryError {
    fn is_retryable(&self) -> bool {
        match self {
            // Only rate limiting is retried inside one pull; everything else waits for the
            // next scheduled sync.
            TributaryError::UpstreamStatus { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_are_retryable() {
        let limited = TributaryError::UpstreamStatus {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            url: "https://api.example.com".to_string(),
        };
        let server = TributaryError::UpstreamStatus {
            status: reqwest::StatusCode::BAD_GATEWAY,
            url: "https://api.example.com".to_string(),
        };
        assert!(limited.is_retryable());
        assert!(!server.is_retryable());
        assert!(!TributaryError::NotInitialized.is_retryable());
    }

    #[test]
    fn conflict_maps_to_409_with_plan_id() {
        let resp = TributaryError::conflict("already registered", Some("plan-1".into()))
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
