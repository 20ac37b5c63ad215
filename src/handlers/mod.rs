//! HTTP dispatch layer
//!
//! A thin Axum surface over `FailoverController`: it only translates JSON to
//! `ChatRequest` and results to responses. Routing decisions never happen here.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::executor::HttpExecutor;
use crate::failover::FailoverController;
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod ask;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd (or internally shared) for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    controller: Arc<FailoverController<HttpExecutor>>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build the controller, executor and metrics for `config`
    pub fn new(config: Config) -> AppResult<Self> {
        let policy = Arc::new(config.policy()?);
        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| AppError::Internal(format!("Failed to initialize metrics: {}", e)))?,
        );
        let controller =
            FailoverController::new(policy, HttpExecutor::new()?).with_metrics(metrics.clone());

        Ok(Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
            metrics,
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancel in-flight requests when `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &FailoverController<HttpExecutor> {
        &self.controller
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

/// Build the Axum router with all routes and middleware
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ask", post(ask::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
