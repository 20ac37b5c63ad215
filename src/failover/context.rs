//! Per-request routing state
//!
//! A `RequestContext` lives on the stack of a single `execute` call. It is never
//! shared between requests, which is what keeps a failover in one request from
//! changing routing for any other request.

use super::events;
use crate::middleware::RequestId;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Which configured endpoint an attempt targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    Primary,
    Fallback,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failover state machine
///
/// ```text
/// UsingPrimary ──success──▶ Completed
///      │  └────terminal failure──▶ Exhausted
///      └─retryable failure─▶ UsingFallback ──success──▶ Completed
///                                  └────any failure────▶ Exhausted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    UsingPrimary,
    UsingFallback,
    Completed,
    Exhausted,
}

impl RoutingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: RoutingState) -> bool {
        matches!(
            (self, next),
            (Self::UsingPrimary, Self::UsingFallback)
                | (Self::UsingPrimary, Self::Completed)
                | (Self::UsingPrimary, Self::Exhausted)
                | (Self::UsingFallback, Self::Completed)
                | (Self::UsingFallback, Self::Exhausted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsingPrimary => "using_primary",
            Self::UsingFallback => "using_fallback",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Routing record for one logical request
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    state: RoutingState,
    switches: u32,
    started: Instant,
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RoutingState::UsingPrimary,
            switches: 0,
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn state(&self) -> RoutingState {
        self.state
    }

    /// Endpoint currently selected for this request
    pub fn active_endpoint(&self) -> EndpointRole {
        match self.state {
            RoutingState::UsingFallback => EndpointRole::Fallback,
            _ => EndpointRole::Primary,
        }
    }

    /// Number of primary → fallback switches so far
    pub fn switches(&self) -> u32 {
        self.switches
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move the state machine forward
    ///
    /// Illegal transitions indicate a controller bug. They are logged and
    /// ignored so the request still terminates.
    pub fn transition(&mut self, next: RoutingState) {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                request_id = %self.request_id,
                from = self.state.as_str(),
                to = next.as_str(),
                "Illegal routing state transition ignored"
            );
            return;
        }

        tracing::trace!(
            request_id = %self.request_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Routing state transition"
        );

        if next == RoutingState::UsingFallback {
            self.switches += 1;
        }
        self.state = next;
    }

    /// Reset routing to the primary endpoint, returning the state it left
    pub fn restore(&mut self) -> RoutingState {
        std::mem::replace(&mut self.state, RoutingState::UsingPrimary)
    }
}

/// Restores a context's routing to the primary when dropped
///
/// Restoration runs on every exit path: success, exhaustion, cancellation,
/// and the `execute` future being dropped mid-attempt.
pub struct RoutingGuard<'a> {
    ctx: &'a mut RequestContext,
}

impl<'a> RoutingGuard<'a> {
    pub fn new(ctx: &'a mut RequestContext) -> Self {
        Self { ctx }
    }
}

impl Deref for RoutingGuard<'_> {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &*self.ctx
    }
}

impl DerefMut for RoutingGuard<'_> {
    fn deref_mut(&mut self) -> &mut RequestContext {
        &mut *self.ctx
    }
}

impl Drop for RoutingGuard<'_> {
    fn drop(&mut self) {
        let finished = self.ctx.restore();
        events::config_restored(&*self.ctx, finished);
    }
}
