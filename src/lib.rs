//! llm-failover - Primary/fallback failover for OpenAI-compatible LLM endpoints
//!
//! Every logical "ask the model" request is sent to the primary endpoint first.
//! Provider-level failures are classified, and a retryable failure triggers
//! exactly one transparent retry against the fallback endpoint. Routing state is
//! scoped to the single request, so a failover never leaks into concurrent
//! requests.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod failover;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod telemetry;
