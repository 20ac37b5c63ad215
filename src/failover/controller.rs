//! Failover controller
//!
//! Runs one logical request through the primary endpoint and, on a retryable
//! failure, exactly once through the fallback endpoint.
//!
//! # Guarantees
//!
//! - The fallback is never started before the primary attempt has definitively
//!   failed. There is no speculative parallel dispatch, so a non-idempotent
//!   completion is billed at most once per endpoint.
//! - At most `max_failover_attempts` (0 or 1) switches per request, so the
//!   number of network attempts is bounded even under permanent failure.
//! - Each attempt runs under the policy's per-attempt timeout. A timeout aborts
//!   the attempt (dropping its future) before the fallback starts.
//! - Caller cancellation aborts the in-flight attempt and yields
//!   `FailoverError::Cancelled`, which is never retried.
//! - Routing state lives in a per-call `RequestContext`; the controller itself
//!   holds nothing mutable, so concurrent requests cannot observe each other.

use super::classifier::classify;
use super::context::{EndpointRole, RequestContext, RoutingGuard, RoutingState};
use super::events;
use super::record::{FailoverError, FailureRecord};
use crate::config::{EndpointConfig, FailoverPolicy};
use crate::executor::{ExecutorError, RequestExecutor};
use crate::metrics::{AttemptResult, Metrics, RequestOutcome};
use crate::middleware::RequestId;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Successful outcome of a logical request
#[derive(Debug, Clone)]
pub struct Completion<R> {
    response: R,
    served_by: EndpointRole,
    primary_failure: Option<FailureRecord>,
}

impl<R> Completion<R> {
    pub fn response(&self) -> &R {
        &self.response
    }

    pub fn into_response(self) -> R {
        self.response
    }

    /// Endpoint that produced the response
    pub fn served_by(&self) -> EndpointRole {
        self.served_by
    }

    pub fn failed_over(&self) -> bool {
        self.served_by == EndpointRole::Fallback
    }

    /// The primary's failure, when the fallback served the request
    pub fn primary_failure(&self) -> Option<&FailureRecord> {
        self.primary_failure.as_ref()
    }
}

/// Result of a single attempt against one endpoint
enum Attempt<R> {
    Succeeded(R),
    Failed(FailureRecord),
    Cancelled,
}

/// Counts one request outcome when dropped
///
/// A future dropped before it finishes (client disconnect) never sets an
/// outcome and is counted as cancelled.
struct OutcomeRecorder<'a> {
    metrics: Option<&'a Metrics>,
    outcome: RequestOutcome,
}

impl<'a> OutcomeRecorder<'a> {
    fn new(metrics: Option<&'a Metrics>) -> Self {
        Self {
            metrics,
            outcome: RequestOutcome::Cancelled,
        }
    }

    fn set(&mut self, outcome: RequestOutcome) {
        self.outcome = outcome;
    }
}

impl Drop for OutcomeRecorder<'_> {
    fn drop(&mut self) {
        if let Some(metrics) = self.metrics {
            metrics.record_request(self.outcome);
        }
    }
}

/// Orchestrates primary/fallback execution for each logical request
pub struct FailoverController<E> {
    policy: Arc<FailoverPolicy>,
    executor: E,
    metrics: Option<Arc<Metrics>>,
}

impl<E: RequestExecutor> FailoverController<E> {
    pub fn new(policy: Arc<FailoverPolicy>, executor: E) -> Self {
        Self {
            policy,
            executor,
            metrics: None,
        }
    }

    /// Record attempts, failures and switches in Prometheus metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Execute one logical request with a freshly generated request id
    pub async fn execute(
        &self,
        request: &E::Request,
        cancel: &CancellationToken,
    ) -> Result<Completion<E::Response>, FailoverError> {
        self.execute_with_id(RequestId::new(), request, cancel).await
    }

    /// Execute one logical request under a caller-supplied correlation id
    pub async fn execute_with_id(
        &self,
        request_id: RequestId,
        request: &E::Request,
        cancel: &CancellationToken,
    ) -> Result<Completion<E::Response>, FailoverError> {
        // Declared first so it drops last, after the guard has restored routing.
        let mut outcome = OutcomeRecorder::new(self.metrics.as_deref());
        let mut ctx = RequestContext::new(request_id);
        let result = {
            let mut guard = RoutingGuard::new(&mut ctx);
            self.run(&mut guard, request, cancel).await
        };

        outcome.set(match &result {
            Ok(_) => RequestOutcome::Completed,
            Err(FailoverError::Cancelled) => RequestOutcome::Cancelled,
            Err(_) => RequestOutcome::Exhausted,
        });

        result
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        request: &E::Request,
        cancel: &CancellationToken,
    ) -> Result<Completion<E::Response>, FailoverError> {
        let primary = self.policy.primary();
        events::selected(ctx, primary);

        let primary_failure = match self
            .attempt(ctx, EndpointRole::Primary, primary, request, cancel)
            .await
        {
            Attempt::Succeeded(response) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    elapsed_ms = ctx.elapsed().as_millis() as u64,
                    "primary succeeded"
                );
                ctx.transition(RoutingState::Completed);
                return Ok(Completion {
                    response,
                    served_by: EndpointRole::Primary,
                    primary_failure: None,
                });
            }
            Attempt::Failed(record) => record,
            Attempt::Cancelled => return Err(FailoverError::Cancelled),
        };

        events::error_detected(ctx, &primary_failure);

        let fallback = match self.fallback_for(ctx, &primary_failure) {
            Some(fallback) => fallback,
            None => {
                ctx.transition(RoutingState::Exhausted);
                return Err(FailoverError::PrimaryFailed(primary_failure));
            }
        };

        events::fallback_switch(ctx, fallback);
        ctx.transition(RoutingState::UsingFallback);
        if let Some(metrics) = &self.metrics {
            metrics.record_switch();
        }

        match self
            .attempt(ctx, EndpointRole::Fallback, fallback, request, cancel)
            .await
        {
            Attempt::Succeeded(response) => {
                events::fallback_success(ctx, fallback);
                ctx.transition(RoutingState::Completed);
                Ok(Completion {
                    response,
                    served_by: EndpointRole::Fallback,
                    primary_failure: Some(primary_failure),
                })
            }
            Attempt::Failed(record) => {
                events::fallback_failure(ctx, &record);
                ctx.transition(RoutingState::Exhausted);
                Err(FailoverError::Exhausted {
                    primary: primary_failure,
                    fallback: record,
                })
            }
            Attempt::Cancelled => Err(FailoverError::Cancelled),
        }
    }

    /// Fallback endpoint to switch to after `failure`, if switching is allowed
    fn fallback_for(
        &self,
        ctx: &RequestContext,
        failure: &FailureRecord,
    ) -> Option<&EndpointConfig> {
        let Some(fallback) = self.policy.fallback() else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                "no fallback configured, propagating primary failure"
            );
            return None;
        };

        if !failure.retryable() {
            tracing::debug!(
                request_id = %ctx.request_id(),
                kind = failure.kind().as_str(),
                "failure is terminal, not switching"
            );
            return None;
        }

        if ctx.switches() >= self.policy.max_failover_attempts() {
            tracing::debug!(
                request_id = %ctx.request_id(),
                switches = ctx.switches(),
                max_failover_attempts = self.policy.max_failover_attempts(),
                "failover attempts exhausted"
            );
            return None;
        }

        Some(fallback)
    }

    async fn attempt(
        &self,
        ctx: &RequestContext,
        role: EndpointRole,
        endpoint: &EndpointConfig,
        request: &E::Request,
        cancel: &CancellationToken,
    ) -> Attempt<E::Response> {
        let started = Instant::now();
        let timeout = self.policy.request_timeout();

        tracing::debug!(
            request_id = %ctx.request_id(),
            endpoint = role.as_str(),
            url = endpoint.base_url(),
            model = endpoint.model_id(),
            timeout_ms = timeout.as_millis() as u64,
            "Attempting request"
        );

        // Cancellation is checked first so an already-cancelled token never
        // starts a network call.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, self.executor.execute(endpoint, request)) => Some(result),
        };

        let result = match outcome {
            None => {
                tracing::info!(
                    request_id = %ctx.request_id(),
                    endpoint = role.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Attempt cancelled by caller"
                );
                self.record_attempt(role, AttemptResult::Cancelled);
                return Attempt::Cancelled;
            }
            Some(Ok(result)) => result,
            Some(Err(_elapsed)) => Err(ExecutorError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(response) => {
                self.record_attempt(role, AttemptResult::Success);
                Attempt::Succeeded(response)
            }
            Err(error) => {
                let kind = classify(&error);
                self.record_attempt(role, AttemptResult::Failure);
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(role, kind);
                }
                Attempt::Failed(FailureRecord::new(
                    role,
                    kind,
                    error.to_string(),
                    started.elapsed(),
                ))
            }
        }
    }

    fn record_attempt(&self, role: EndpointRole, result: AttemptResult) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(role, result);
        }
    }
}
