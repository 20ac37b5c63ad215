//! Failure classification
//!
//! `classify` is a pure, total function: every `ExecutorError` maps to exactly
//! one `FailureKind`, and anything unrecognised becomes `Unclassified` rather
//! than an error of its own.
//!
//! Rules are applied in priority order, first match wins:
//!
//! 1. HTTP 401/403, or an auth marker in the text → `Auth`
//! 2. HTTP 429, or a rate-limit marker in the text → `RateLimit`
//! 3. Connect/DNS/reset transport failures → `Network`
//! 4. Client-side deadline exceeded → `Timeout`
//! 5. HTTP status >= 500 → `ServerError`
//! 6. Anything else → `Unclassified`
//!
//! Structured fields (status codes, transport variants) are checked first.
//! Substring markers are a last resort for providers that report errors only
//! as text. Transport variants never reach the markers: their text embeds the
//! request URL, which is not evidence of anything.

use super::context::EndpointRole;
use crate::executor::ExecutorError;
use serde::{Deserialize, Serialize};
use std::fmt;

const AUTH_MARKERS: &[&str] = &["invalid api key", "invalid_api_key", "authentication"];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit"];
const NETWORK_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "dns error",
    "failed to lookup address",
];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "deadline exceeded"];

/// Classification tag for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Auth,
    RateLimit,
    Timeout,
    Network,
    ServerError,
    Unclassified,
}

impl FailureKind {
    /// All kinds, in classification priority order
    pub const ALL: [FailureKind; 6] = [
        FailureKind::Auth,
        FailureKind::RateLimit,
        FailureKind::Network,
        FailureKind::Timeout,
        FailureKind::ServerError,
        FailureKind::Unclassified,
    ];

    /// Label used in log events and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "Auth",
            Self::RateLimit => "RateLimit",
            Self::Timeout => "Timeout",
            Self::Network => "Network",
            Self::ServerError => "ServerError",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Whether a failure of this kind on `role` may be retried on another endpoint
    ///
    /// Every kind is retryable on the primary: even `Auth`, because the
    /// fallback carries its own credential. `Auth` on the fallback is terminal.
    /// The controller also caps switches at `max_failover_attempts`, so no
    /// fallback failure is ever retried in practice.
    pub fn is_retryable_on(&self, role: EndpointRole) -> bool {
        match (self, role) {
            (_, EndpointRole::Primary) => true,
            (Self::Auth, EndpointRole::Fallback) => false,
            (
                Self::RateLimit
                | Self::Timeout
                | Self::Network
                | Self::ServerError
                | Self::Unclassified,
                EndpointRole::Fallback,
            ) => true,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw executor failure
pub fn classify(error: &ExecutorError) -> FailureKind {
    // A transport failure never carries a status, so rules 1-2 cannot match
    // it structurally.
    if error.is_transport() {
        return FailureKind::Network;
    }

    let text = error.free_text();
    let has = |markers: &[&str]| {
        text.as_deref()
            .is_some_and(|t| markers.iter().any(|m| t.contains(m)))
    };

    if matches!(error.status(), Some(401 | 403)) || has(AUTH_MARKERS) {
        return FailureKind::Auth;
    }

    if error.status() == Some(429) || has(RATE_LIMIT_MARKERS) {
        return FailureKind::RateLimit;
    }

    if matches!(error, ExecutorError::Other(_)) && has(NETWORK_MARKERS) {
        return FailureKind::Network;
    }

    match error {
        ExecutorError::Timeout { .. } => return FailureKind::Timeout,
        ExecutorError::Other(_) if has(TIMEOUT_MARKERS) => return FailureKind::Timeout,
        _ => {}
    }

    if error.status().is_some_and(|s| s >= 500) {
        return FailureKind::ServerError;
    }

    FailureKind::Unclassified
}
