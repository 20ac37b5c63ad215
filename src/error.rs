//! Error types for llm-failover
//!
//! `AppError` covers startup and dispatch failures and implements `IntoResponse`
//! for Axum handlers. Provider failures during a request are carried by
//! `FailoverError` and wrapped here only at the HTTP boundary.

use crate::failover::FailoverError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Failover(#[from] FailoverError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Failover(FailoverError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Failover(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_)
            | Self::MissingEnv(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Provider failures carry upstream URLs and raw provider text. Clients
        // get the summary and kinds; the detail stays in the log.
        let (message, kinds): (String, Vec<&'static str>) = match &self {
            Self::Failover(e) => {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Request failed on every attempted endpoint");
                }
                (
                    e.summary().to_string(),
                    e.records().iter().map(|r| r.kind().as_str()).collect(),
                )
            }
            _ => (self.to_string(), Vec::new()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "failure_kinds": kinds,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
