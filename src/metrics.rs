//! Prometheus metrics for failover activity
//!
//! Tracks:
//! - Attempts per endpoint and their outcome
//! - Classified failures per endpoint and kind
//! - Primary → fallback switches
//! - Logical request outcomes
//!
//! Exposed via the `/metrics` endpoint in Prometheus text format. Every label
//! comes from a closed enum, so cardinality is fixed at compile time.

use crate::failover::{EndpointRole, FailureKind};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Outcome of a single attempt against one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Failure,
    Cancelled,
}

impl AttemptResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Terminal outcome of a logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    Exhausted,
    Cancelled,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Metrics collector
///
/// Cloning shares the underlying registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    attempts_total: IntCounterVec,
    failures_total: IntCounterVec,
    switches_total: IntCounter,
    requests_total: IntCounterVec,
    recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a collector with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 endpoints × 3 outcomes
        let attempts_total = IntCounterVec::new(
            Opts::new(
                "llm_failover_attempts_total",
                "Total completion attempts by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;

        // Cardinality: 2 endpoints × 6 kinds
        let failures_total = IntCounterVec::new(
            Opts::new(
                "llm_failover_failures_total",
                "Total classified attempt failures by endpoint and failure kind",
            ),
            &["endpoint", "kind"],
        )?;

        let switches_total = IntCounter::with_opts(Opts::new(
            "llm_failover_switches_total",
            "Total primary to fallback switches",
        ))?;

        let requests_total = IntCounterVec::new(
            Opts::new(
                "llm_failover_requests_total",
                "Total logical requests by terminal outcome",
            ),
            &["outcome"],
        )?;

        let recording_failures = IntCounterVec::new(
            Opts::new(
                "llm_failover_metrics_recording_failures_total",
                "Total metrics recording failures by operation. \
                Indicates Prometheus internal errors.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        registry.register(Box::new(switches_total.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            attempts_total,
            failures_total,
            switches_total,
            requests_total,
            recording_failures,
        })
    }

    /// Record one attempt against `endpoint`
    ///
    /// Recording failures are logged and counted; they never affect the request.
    pub fn record_attempt(&self, endpoint: EndpointRole, result: AttemptResult) {
        match self
            .attempts_total
            .get_metric_with_label_values(&[endpoint.as_str(), result.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => self.recording_failure("record_attempt", &e),
        }
    }

    /// Record a classified failure on `endpoint`
    pub fn record_failure(&self, endpoint: EndpointRole, kind: FailureKind) {
        match self
            .failures_total
            .get_metric_with_label_values(&[endpoint.as_str(), kind.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => self.recording_failure("record_failure", &e),
        }
    }

    pub fn record_switch(&self) {
        self.switches_total.inc();
    }

    /// Record the terminal outcome of a logical request
    pub fn record_request(&self, outcome: RequestOutcome) {
        match self
            .requests_total
            .get_metric_with_label_values(&[outcome.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => self.recording_failure("record_request", &e),
        }
    }

    fn recording_failure(&self, operation: &str, error: &prometheus::Error) {
        tracing::warn!(
            operation,
            error = %error,
            "Failed to record metric, continuing"
        );
        self.recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    pub fn attempts_count(&self, endpoint: EndpointRole, result: AttemptResult) -> u64 {
        self.attempts_total
            .get_metric_with_label_values(&[endpoint.as_str(), result.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn failures_count(&self, endpoint: EndpointRole, kind: FailureKind) -> u64 {
        self.failures_total
            .get_metric_with_label_values(&[endpoint.as_str(), kind.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn switches_count(&self) -> u64 {
        self.switches_total.get()
    }

    pub fn requests_count(&self, outcome: RequestOutcome) -> u64 {
        self.requests_total
            .get_metric_with_label_values(&[outcome.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Sum of metrics recording failures across all operations
    pub fn recording_failures_count(&self) -> u64 {
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.name() == "llm_failover_metrics_recording_failures_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_families.len(),
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(
                invalid_byte_index = e.utf8_error().valid_up_to(),
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}
