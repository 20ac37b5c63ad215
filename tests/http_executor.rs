//! `HttpExecutor` against a mock OpenAI-compatible server
//!
//! Verifies the wire format and that every provider/transport failure mode
//! surfaces as the `ExecutorError` the classifier expects.

use llm_failover::config::EndpointConfig;
use llm_failover::executor::{ChatRequest, ExecutorError, HttpExecutor, RequestExecutor};
use llm_failover::failover::{FailureKind, classify};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str, model: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn endpoint_for(server: &MockServer, api_key: &str) -> EndpointConfig {
    EndpointConfig::new(format!("{}/v1", server.uri()), api_key, "gpt-4o-mini")
        .expect("valid endpoint")
}

async fn execute(endpoint: &EndpointConfig) -> Result<String, ExecutorError> {
    let executor = HttpExecutor::new().expect("client");
    executor
        .execute(endpoint, &ChatRequest::user("Hello"))
        .await
        .map(|r| r.content().to_string())
}

#[tokio::test]
async fn test_success_sends_bearer_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "Hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi!", "gpt-4o-mini-2024")))
        .expect(1)
        .mount(&server)
        .await;

    let executor = HttpExecutor::new().expect("client");
    let response = executor
        .execute(&endpoint_for(&server, "sk-test"), &ChatRequest::user("Hello"))
        .await
        .expect("should succeed");

    assert_eq!(response.content(), "Hi!");
    assert_eq!(response.model(), "gpt-4o-mini-2024");
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok", "m")))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = EndpointConfig::new(format!("{}/v1/", server.uri()), "sk", "m")
        .expect("valid endpoint");
    assert_eq!(execute(&endpoint).await.expect("should succeed"), "ok");
}

#[tokio::test]
async fn test_openai_auth_error_classifies_as_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided: sk-bad.",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let err = execute(&endpoint_for(&server, "sk-bad"))
        .await
        .expect_err("should fail");

    assert_eq!(err.status(), Some(401));
    assert!(matches!(&err, ExecutorError::Http { error_type: Some(t), .. } if t.contains("invalid_api_key")));
    assert_eq!(classify(&err), FailureKind::Auth);
}

#[tokio::test]
async fn test_status_codes_classify() {
    let cases = [
        (403, FailureKind::Auth),
        (429, FailureKind::RateLimit),
        (500, FailureKind::ServerError),
        (502, FailureKind::ServerError),
        (503, FailureKind::ServerError),
        (404, FailureKind::Unclassified),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
            .mount(&server)
            .await;

        let err = execute(&endpoint_for(&server, "sk"))
            .await
            .expect_err("should fail");
        assert_eq!(err.status(), Some(status));
        assert_eq!(classify(&err), expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_rate_limit_in_body_with_other_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Rate limit reached for gpt-4o-mini", "type": "requests" }
        })))
        .mount(&server)
        .await;

    let err = execute(&endpoint_for(&server, "sk"))
        .await
        .expect_err("should fail");
    assert_eq!(classify(&err), FailureKind::RateLimit);
}

#[tokio::test]
async fn test_invalid_json_is_unclassified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = execute(&endpoint_for(&server, "sk"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, ExecutorError::InvalidResponse(_)));
    assert_eq!(classify(&err), FailureKind::Unclassified);
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = execute(&endpoint_for(&server, "sk"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, ExecutorError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network() {
    // Nothing listens on port 1
    let endpoint = EndpointConfig::new("http://127.0.0.1:1/v1", "sk", "m").expect("valid endpoint");

    let err = execute(&endpoint).await.expect_err("should fail");

    assert_eq!(classify(&err), FailureKind::Network, "error: {:?}", err);
}

#[tokio::test]
async fn test_oversized_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(10_000)))
        .mount(&server)
        .await;

    let err = execute(&endpoint_for(&server, "sk"))
        .await
        .expect_err("should fail");
    match err {
        ExecutorError::Http { message, .. } => assert!(message.chars().count() < 600),
        other => panic!("expected Http, got {:?}", other),
    }
}

/// Accept one connection, read the whole request, write `reply` and hang up
async fn hang_up_after(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            // Wait for the body so the client is done writing
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !received.windows(5).any(|w| w == b"Hello") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}/v1", addr)
}

async fn execute_without_pool(endpoint: &EndpointConfig) -> Result<String, ExecutorError> {
    // No idle pooling, so reqwest cannot transparently retry on a fresh connection
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    HttpExecutor::with_client(client)
        .execute(endpoint, &ChatRequest::user("Hello"))
        .await
        .map(|r| r.content().to_string())
}

#[tokio::test]
async fn test_connection_closed_before_response_is_reset() {
    let url = hang_up_after(b"").await;
    let endpoint = EndpointConfig::new(url, "sk", "m").expect("valid endpoint");

    let err = execute_without_pool(&endpoint).await.expect_err("should fail");

    assert!(matches!(err, ExecutorError::Reset(_)), "error: {:?}", err);
    assert_eq!(classify(&err), FailureKind::Network);
}

#[tokio::test]
async fn test_connection_closed_mid_body_is_reset() {
    let url = hang_up_after(
        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"choices\":[",
    )
    .await;
    let endpoint = EndpointConfig::new(url, "sk", "m").expect("valid endpoint");

    let err = execute_without_pool(&endpoint).await.expect_err("should fail");

    assert!(matches!(err, ExecutorError::Reset(_)), "error: {:?}", err);
    assert_eq!(classify(&err), FailureKind::Network);
}

#[tokio::test]
async fn test_marker_words_in_unreachable_url_stay_network() {
    let endpoint =
        EndpointConfig::new("http://127.0.0.1:1/rate_limit/authentication/v1", "sk", "m")
            .expect("valid endpoint");

    let err = execute(&endpoint).await.expect_err("should fail");

    assert!(err.is_transport(), "error: {:?}", err);
    assert_eq!(classify(&err), FailureKind::Network);
}
