//! Shared helpers for integration tests
//!
//! - `ScriptedExecutor`: a `RequestExecutor` whose behaviour per endpoint (and
//!   optionally per request) is fixed up front, recording every call
//! - `EventLog`: a `tracing` layer capturing transition events so tests can
//!   assert on tags instead of log prose

#![allow(dead_code)]

use async_trait::async_trait;
use llm_failover::config::{EndpointConfig, FailoverPolicy};
use llm_failover::executor::{ExecutorError, RequestExecutor};
use llm_failover::middleware::RequestId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub const PRIMARY_URL: &str = "http://primary.test/v1";
pub const FALLBACK_URL: &str = "http://fallback.test/v1";

pub fn endpoint(base_url: &str, api_key: &str) -> EndpointConfig {
    EndpointConfig::new(base_url, api_key, "test-model").expect("valid test endpoint")
}

pub fn policy_with_fallback() -> Arc<FailoverPolicy> {
    Arc::new(FailoverPolicy::new(
        endpoint(PRIMARY_URL, "sk-primary"),
        Some(endpoint(FALLBACK_URL, "sk-fallback")),
    ))
}

pub fn policy_without_fallback() -> Arc<FailoverPolicy> {
    Arc::new(FailoverPolicy::new(endpoint(PRIMARY_URL, "sk-primary"), None))
}

pub fn http_error(status: u16, message: &str) -> ExecutorError {
    ExecutorError::Http {
        status,
        error_type: None,
        message: message.to_string(),
    }
}

/// Scripted outcome of one call
#[derive(Debug, Clone)]
pub struct Script {
    pub result: Result<String, ExecutorError>,
    pub delay: Duration,
}

impl Script {
    pub fn ok(body: &str) -> Self {
        Self {
            result: Ok(body.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn err(error: ExecutorError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Observable executor activity, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Started { url: String, request: String },
    Finished { url: String, request: String },
}

/// Executor answering from scripts keyed by base URL and optional request text
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<(String, Option<String>), Script>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every request sent to `url`
    pub fn on(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert((url.to_string(), None), script);
        self
    }

    /// Script one specific request sent to `url`
    pub fn on_request(mut self, url: &str, request: &str, script: Script) -> Self {
        self.scripts
            .insert((url.to_string(), Some(request.to_string())), script);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// URLs of started calls, in order
    pub fn started_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Started { url, .. } => Some(url),
                Call::Finished { .. } => None,
            })
            .collect()
    }

    /// URLs of started calls for one request text
    pub fn started_urls_for(&self, request: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Started { url, request: r } if r == request => Some(url),
                _ => None,
            })
            .collect()
    }

    fn script_for(&self, url: &str, request: &str) -> Script {
        self.scripts
            .get(&(url.to_string(), Some(request.to_string())))
            .or_else(|| self.scripts.get(&(url.to_string(), None)))
            .cloned()
            .unwrap_or_else(|| Script::err(ExecutorError::Other(format!("unscripted call to {}", url))))
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    type Request = String;
    type Response = String;

    async fn execute(
        &self,
        endpoint: &EndpointConfig,
        request: &String,
    ) -> Result<String, ExecutorError> {
        let url = endpoint.base_url().to_string();
        let script = self.script_for(&url, request);

        self.calls.lock().expect("calls lock").push(Call::Started {
            url: url.clone(),
            request: request.clone(),
        });

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        self.calls.lock().expect("calls lock").push(Call::Finished {
            url,
            request: request.clone(),
        });

        script.result
    }
}

/// One captured `tracing` event
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub target: String,
    pub level: Level,
    pub event: Option<String>,
    pub request_id: Option<String>,
    pub kind: Option<String>,
}

/// `tracing` layer recording every event it sees
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().expect("events lock").clone()
    }

    /// Transition events only
    pub fn transitions(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.target == "llm_failover::events" && e.event.is_some())
            .collect()
    }

    /// Transition tags in emission order
    pub fn tags(&self) -> Vec<String> {
        self.transitions()
            .into_iter()
            .filter_map(|e| e.event)
            .collect()
    }

    /// Transition tags emitted for one request
    pub fn tags_for(&self, request_id: &RequestId) -> Vec<String> {
        let id = request_id.to_string();
        self.transitions()
            .into_iter()
            .filter(|e| e.request_id.as_deref() == Some(id.as_str()))
            .filter_map(|e| e.event)
            .collect()
    }

    /// First transition event with `tag`
    pub fn find(&self, tag: &str) -> Option<CapturedEvent> {
        self.transitions()
            .into_iter()
            .find(|e| e.event.as_deref() == Some(tag))
    }
}

#[derive(Default)]
struct FieldVisitor {
    event: Option<String>,
    request_id: Option<String>,
    kind: Option<String>,
}

impl FieldVisitor {
    fn set(&mut self, field: &Field, value: String) {
        match field.name() {
            "event" => self.event = Some(value),
            "request_id" => self.request_id = Some(value),
            "kind" => self.kind = Some(value),
            _ => {}
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field, format!("{:?}", value));
    }
}

impl<S: Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.events.lock().expect("events lock").push(CapturedEvent {
            target: event.metadata().target().to_string(),
            level: *event.metadata().level(),
            event: visitor.event,
            request_id: visitor.request_id,
            kind: visitor.kind,
        });
    }
}

/// Capture events on the current thread until the guard is dropped
pub fn capture_events() -> (EventLog, tracing::subscriber::DefaultGuard) {
    let log = EventLog::default();
    let subscriber = tracing_subscriber::registry().with(log.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (log, guard)
}
