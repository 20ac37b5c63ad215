//! Primary/fallback failover for LLM completion requests
//!
//! - `classifier`: maps raw executor errors onto `FailureKind`
//! - `context`: per-request routing state and the restore-on-drop guard
//! - `controller`: the state machine driving one logical request
//! - `events`: tagged transition events for operational tooling
//! - `record`: failure records and the controller's error type

pub mod classifier;
pub mod context;
pub mod controller;
pub mod events;
pub mod record;

pub use classifier::{FailureKind, classify};
pub use context::{EndpointRole, RequestContext, RoutingGuard, RoutingState};
pub use controller::{Completion, FailoverController};
pub use events::LogEvent;
pub use record::{FailoverError, FailureRecord};
