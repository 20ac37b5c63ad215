//! Structured transition events
//!
//! Every state-machine transition emits exactly one `tracing` event carrying an
//! `event` field with a stable tag and the `request_id` of the logical request.
//! Operational tooling and tests match on these tags, never on message prose.

use super::context::{EndpointRole, RequestContext, RoutingState};
use super::record::FailureRecord;
use crate::config::EndpointConfig;

/// Stable tags for the log event contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    Selected,
    ErrorDetected,
    FallbackSwitch,
    FallbackSuccess,
    FallbackFailure,
    ConfigRestored,
}

impl LogEvent {
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Selected => "API_SELECTED",
            Self::ErrorDetected => "API_ERROR_DETECTED",
            Self::FallbackSwitch => "API_FALLBACK_SWITCH",
            Self::FallbackSuccess => "API_FALLBACK_SUCCESS",
            Self::FallbackFailure => "API_FALLBACK_FAILURE",
            Self::ConfigRestored => "API_CONFIG_RESTORED",
        }
    }
}

impl std::fmt::Display for LogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

pub(crate) fn selected(ctx: &RequestContext, endpoint: &EndpointConfig) {
    tracing::info!(
        target: "llm_failover::events",
        event = LogEvent::Selected.tag(),
        request_id = %ctx.request_id(),
        endpoint = EndpointRole::Primary.as_str(),
        model = endpoint.model_id(),
        "primary selected"
    );
}

pub(crate) fn error_detected(ctx: &RequestContext, record: &FailureRecord) {
    tracing::warn!(
        target: "llm_failover::events",
        event = LogEvent::ErrorDetected.tag(),
        request_id = %ctx.request_id(),
        endpoint = record.endpoint().as_str(),
        kind = record.kind().as_str(),
        retryable = record.retryable(),
        elapsed_ms = record.elapsed().as_millis() as u64,
        raw_message = record.raw_message(),
        "error detected: {}",
        record.kind()
    );
}

pub(crate) fn fallback_switch(ctx: &RequestContext, endpoint: &EndpointConfig) {
    tracing::warn!(
        target: "llm_failover::events",
        event = LogEvent::FallbackSwitch.tag(),
        request_id = %ctx.request_id(),
        endpoint = EndpointRole::Fallback.as_str(),
        model = endpoint.model_id(),
        "switching to fallback"
    );
}

pub(crate) fn fallback_success(ctx: &RequestContext, endpoint: &EndpointConfig) {
    tracing::info!(
        target: "llm_failover::events",
        event = LogEvent::FallbackSuccess.tag(),
        request_id = %ctx.request_id(),
        endpoint = EndpointRole::Fallback.as_str(),
        model = endpoint.model_id(),
        elapsed_ms = ctx.elapsed().as_millis() as u64,
        "fallback succeeded"
    );
}

pub(crate) fn fallback_failure(ctx: &RequestContext, record: &FailureRecord) {
    tracing::error!(
        target: "llm_failover::events",
        event = LogEvent::FallbackFailure.tag(),
        request_id = %ctx.request_id(),
        endpoint = record.endpoint().as_str(),
        kind = record.kind().as_str(),
        raw_message = record.raw_message(),
        "fallback failed: {}",
        record.kind()
    );
}

pub(crate) fn config_restored(ctx: &RequestContext, finished: RoutingState) {
    tracing::info!(
        target: "llm_failover::events",
        event = LogEvent::ConfigRestored.tag(),
        request_id = %ctx.request_id(),
        final_state = finished.as_str(),
        switches = ctx.switches(),
        "configuration restored"
    );
}
