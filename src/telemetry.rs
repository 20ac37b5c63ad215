//! Structured logging setup
//!
//! Configures `tracing-subscriber` with an `EnvFilter`. Failover transition
//! events are emitted under the `llm_failover::events` target, so
//! `RUST_LOG=llm_failover::events=info` isolates them.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directive for `level`
pub fn default_filter(level: &str) -> String {
    format!("llm_failover={},tower_http=debug", level)
}

/// Initialize the global tracing subscriber
///
/// Only the first call per process has an effect. `RUST_LOG` takes precedence
/// over `default_level`.
///
/// ```no_run
/// llm_failover::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
