//! Ask endpoint
//!
//! Handles `POST /ask`: one prompt in, one completion out, with failover
//! handled by the controller.

use crate::error::{AppError, AppResult};
use crate::executor::ChatRequest;
use crate::failover::{EndpointRole, FailureKind};
use crate::handlers::AppState;
use crate::middleware::RequestId;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum allowed prompt length in characters
const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Ask request from a client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    message: String,
    system: Option<String>,
}

impl AskRequest {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Convert into the executor's chat payload
    pub fn to_chat_request(&self) -> ChatRequest {
        let request = ChatRequest::user(self.message.clone());
        match &self.system {
            Some(system) => request.with_system(system.clone()),
            None => request,
        }
    }
}

impl<'de> Deserialize<'de> for AskRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct AskRequestRaw {
            message: String,
            #[serde(default)]
            system: Option<String>,
        }

        let raw = AskRequestRaw::deserialize(deserializer)?;

        if raw.message.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "message cannot be empty or contain only whitespace",
            ));
        }

        let char_count = raw.message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "message exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        Ok(AskRequest {
            message: raw.message,
            system: raw.system.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Ask response returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub content: String,
    pub model: String,
    pub served_by: EndpointRole,
    pub failed_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_failure: Option<FailureKind>,
    pub request_id: String,
}

/// `POST /ask`
///
/// Returns 400 for invalid bodies, 502 when every endpoint failed and 503 when
/// the server is shutting down.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> AppResult<Json<AskResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    tracing::debug!(
        request_id = %request_id,
        message_length = request.message().chars().count(),
        has_system = request.system().is_some(),
        "Received ask request"
    );

    let cancel = state.shutdown().child_token();
    let completion = state
        .controller()
        .execute_with_id(request_id, &request.to_chat_request(), &cancel)
        .await?;

    let served_by = completion.served_by();
    let failed_over = completion.failed_over();
    let primary_failure = completion.primary_failure().map(|r| r.kind());
    let response = completion.into_response();

    Ok(Json(AskResponse {
        content: response.content().to_string(),
        model: response.model().to_string(),
        served_by,
        failed_over,
        primary_failure,
        request_id: request_id.to_string(),
    }))
}
