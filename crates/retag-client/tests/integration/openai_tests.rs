//! Integration tests for `OpenAIClient` against a mock HTTP server.

use std::time::Duration;

use futures::StreamExt;
use retag_client::OpenAIClient;
use retag_core::traits::RemoteGenerator;
use retag_core::{ChatMessage, GenerationError, HttpConfig, TagGenerator, WorkItem};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    body.push_str(": connected\n\n");
    body.push_str(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    );
    for delta in deltas {
        let chunk = serde_json::json!({
            "id": "c1",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn client_for(server: &MockServer) -> OpenAIClient {
    OpenAIClient::with_config(
        "test-key",
        "test-model",
        Some(&format!("{}/v1/chat/completions", server.uri())),
        HttpConfig {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
        },
    )
    .expect("client builds")
}

async fn collect(client: &OpenAIClient) -> Result<String, GenerationError> {
    let mut tokens = client.generate(&[ChatMessage::user("hello")]).await?;
    let mut text = String::new();
    while let Some(token) = tokens.next().await {
        text.push_str(&token?);
    }
    Ok(text)
}

#[tokio::test]
async fn test_streams_content_deltas() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["rust", ", tok", "io"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    // Act
    let text = collect(&client).await.unwrap();

    // Assert
    assert_eq!(text, "rust, tokio");
}

#[tokio::test]
async fn test_429_is_rate_limited_with_retry_hint() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "2")
                .set_body_json(serde_json::json!({
                    "error": {"message": "Rate limit reached", "type": "requests"}
                })),
        )
        .mount(&server)
        .await;
    let client = client_for(&server);

    // Act
    let err = collect(&client).await.unwrap_err();

    // Assert
    assert_eq!(
        err,
        GenerationError::RateLimited {
            message: "Rate limit reached".to_string(),
            retry_after: Some(Duration::from_secs(2)),
        }
    );
}

#[tokio::test]
async fn test_server_error_is_remote_error() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    // Act
    let err = collect(&client).await.unwrap_err();

    // Assert
    assert!(matches!(err, GenerationError::Remote { status: 500, .. }));
    assert!(!err.is_rate_limited());
}

#[tokio::test]
async fn test_in_band_error_ends_stream() {
    // Arrange
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n\
                data: {\"error\":{\"message\":\"rate_limit exceeded mid-stream\"}}\n\n";
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    // Act
    let err = collect(&client).await.unwrap_err();

    // Assert
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Arrange: bind a server, then drop it so the port refuses connections
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    // Act
    let err = collect(&client).await.unwrap_err();

    // Assert
    assert!(matches!(
        err,
        GenerationError::Network(_) | GenerationError::Timeout(_)
    ));
}

#[tokio::test]
async fn test_tag_generator_over_http() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&["```\n", "async, ", "Rust，runtime\n", "```"]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    let generator = TagGenerator::new(client_for(&server));
    let item = WorkItem::new("1", "Tokio", "https://tokio.rs");

    // Act
    let tags = generator
        .generate(&item, &["rust".to_string()])
        .await
        .unwrap();

    // Assert
    assert_eq!(tags, vec!["async", "Rust", "runtime"]);
}
