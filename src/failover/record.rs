//! Failure records and the controller's error type

use super::classifier::FailureKind;
use super::context::EndpointRole;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One failed attempt, classified
///
/// Created and discarded within a single `execute` call. `raw_message` is kept
/// for diagnostics only and never drives control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    endpoint: EndpointRole,
    kind: FailureKind,
    retryable: bool,
    raw_message: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl FailureRecord {
    /// Create a record; retryability is derived from the kind and endpoint
    pub fn new(
        endpoint: EndpointRole,
        kind: FailureKind,
        raw_message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            endpoint,
            kind,
            retryable: kind.is_retryable_on(endpoint),
            raw_message: raw_message.into(),
            elapsed,
        }
    }

    pub fn endpoint(&self) -> EndpointRole {
        self.endpoint
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.kind, self.endpoint, self.raw_message)
    }
}

/// Terminal failure of a logical request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailoverError {
    /// Only the primary was attempted (no fallback, failover disabled, or the
    /// failure was terminal)
    #[error("Primary endpoint failed: {0}")]
    PrimaryFailed(FailureRecord),

    /// Primary and fallback both failed
    #[error("All endpoints failed. Primary: {primary}. Fallback: {fallback}")]
    Exhausted {
        primary: FailureRecord,
        fallback: FailureRecord,
    },

    /// The caller cancelled the request. Not a provider failure.
    #[error("Request cancelled by caller")]
    Cancelled,
}

impl FailoverError {
    /// Failure records in attempt order
    pub fn records(&self) -> Vec<&FailureRecord> {
        match self {
            Self::PrimaryFailed(primary) => vec![primary],
            Self::Exhausted { primary, fallback } => vec![primary, fallback],
            Self::Cancelled => Vec::new(),
        }
    }

    /// Client-facing description without endpoint or provider detail
    pub fn summary(&self) -> &'static str {
        match self {
            Self::PrimaryFailed(_) => "Primary endpoint failed",
            Self::Exhausted { .. } => "All endpoints failed",
            Self::Cancelled => "Request cancelled by caller",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Kind of the last failed attempt
    pub fn last_kind(&self) -> Option<FailureKind> {
        self.records().last().map(|r| r.kind())
    }
}
