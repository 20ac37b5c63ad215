//! OpenAI-compatible HTTP executor
//!
//! Sends `POST {base_url}/chat/completions` with bearer authentication and maps
//! every failure to a structured `ExecutorError`.

use super::types::{ChatRequest, ChatResponse, CompletionBody, CompletionReply, ProviderErrorBody};
use super::{ExecutorError, RequestExecutor};
use crate::config::EndpointConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::time::Duration;

/// Connection establishment budget, separate from the per-attempt timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body kept for diagnostics (in characters)
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Executor backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// Create an executor with a fresh connection pool
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shared pool, custom TLS settings)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn execute(
        &self,
        endpoint: &EndpointConfig,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ExecutorError> {
        let url = endpoint.chat_completions_url();
        let body = CompletionBody::new(endpoint.model_id(), request);

        tracing::debug!(
            url = %url,
            model = endpoint.model_id(),
            messages = request.messages().len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(endpoint.api_key().expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &bytes));
        }

        let reply: CompletionReply = serde_json::from_slice(&bytes)
            .map_err(|e| ExecutorError::InvalidResponse(format!("not a chat completion: {}", e)))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ExecutorError::InvalidResponse("completion contained no message content".to_string())
            })?;

        Ok(ChatResponse::new(
            content,
            reply
                .model
                .unwrap_or_else(|| endpoint.model_id().to_string()),
        ))
    }
}

/// Map a non-success response to `ExecutorError::Http`
///
/// OpenAI-style error envelopes contribute their `type` and `code` tags; any
/// other body is kept verbatim (truncated) as the message.
fn provider_error(status: u16, body: &[u8]) -> ExecutorError {
    match serde_json::from_slice::<ProviderErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed.error.code.and_then(|c| match c {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            });
            let tags: Vec<String> = parsed.error.error_type.into_iter().chain(code).collect();
            ExecutorError::Http {
                status,
                error_type: (!tags.is_empty()).then(|| tags.join(" ")),
                message: parsed.error.message.unwrap_or_default(),
            }
        }
        Err(_) => ExecutorError::Http {
            status,
            error_type: None,
            message: truncate_chars(&String::from_utf8_lossy(body), MAX_ERROR_BODY_CHARS),
        },
    }
}

/// Map a reqwest transport failure onto the structured variants
fn transport_error(error: &reqwest::Error) -> ExecutorError {
    let detail = error_chain(error);
    let lower = detail.to_lowercase();

    if error.is_connect() {
        if lower.contains("dns") || lower.contains("lookup address") {
            return ExecutorError::Dns(detail);
        }
        return ExecutorError::Connect(detail);
    }

    // Body errors mean the stream died after the status line arrived.
    if error.is_body()
        || lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("connection closed")
    {
        return ExecutorError::Reset(detail);
    }

    if error.is_decode() {
        return ExecutorError::InvalidResponse(detail);
    }

    ExecutorError::Other(detail)
}

/// Display an error together with all of its sources
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Truncate on a character boundary
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
