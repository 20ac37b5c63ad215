//! Request execution boundary
//!
//! The failover controller knows nothing about HTTP. It hands an endpoint and
//! an opaque request to a `RequestExecutor` and gets back either a response or
//! an `ExecutorError` describing what went wrong at the transport/provider
//! level. Tests swap in scripted executors; production uses `HttpExecutor`.

pub mod http;
pub mod types;

pub use http::HttpExecutor;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role};

use crate::config::EndpointConfig;
use async_trait::async_trait;
use thiserror::Error;

/// Performs a single network call against one endpoint
///
/// Implementations must not retry internally; retry policy belongs to the
/// failover controller. Dropping the returned future must abort the call.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Payload sent to the provider
    type Request: Send + Sync;
    /// Payload received on success
    type Response: Send;

    async fn execute(
        &self,
        endpoint: &EndpointConfig,
        request: &Self::Request,
    ) -> Result<Self::Response, ExecutorError>;
}

/// Raw failure reported by a `RequestExecutor`
///
/// Variants carry structured detail (status codes, transport phase) so the
/// classifier can avoid string matching wherever possible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Provider answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// Provider error tag (`error.type` or `error.code` in OpenAI-style bodies)
        error_type: Option<String>,
        message: String,
    },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("connection reset: {0}")]
    Reset(String),

    /// No response arrived before the client-side deadline
    #[error("no response within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ExecutorError {
    /// Lower-cased free-text detail, used only for last-resort heuristics
    ///
    /// Transport variants have none: their text is the client's description of
    /// the request (URL included), not anything the provider said.
    pub fn free_text(&self) -> Option<String> {
        let text = match self {
            Self::Http {
                error_type,
                message,
                ..
            } => match error_type {
                Some(tag) => format!("{} {}", tag, message),
                None => message.clone(),
            },
            Self::InvalidResponse(m) | Self::Other(m) => m.clone(),
            Self::Connect(_) | Self::Dns(_) | Self::Reset(_) | Self::Timeout { .. } => return None,
        };
        Some(text.to_lowercase())
    }

    /// Connection could not be established or was torn down mid-exchange
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Dns(_) | Self::Reset(_))
    }

    /// HTTP status, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
