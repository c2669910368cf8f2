//! OpenAI-compatible chat completions client.
//!
//! Works with any endpoint that speaks the `/v1/chat/completions` streaming
//! protocol (OpenAI, Azure OpenAI, OpenRouter, local Ollama/LM Studio).
//!
//! # Examples
//!
//! ```no_run
//! use futures::StreamExt;
//! use retag_client::OpenAIClient;
//! use retag_core::ChatMessage;
//! use retag_core::traits::RemoteGenerator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAIClient::new("sk-your-api-key")?;
//! let mut tokens = client
//!     .generate(&[ChatMessage::user("Suggest tags for https://tokio.rs")])
//!     .await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use retag_core::error::AppError;
use retag_core::{ChatMessage, GenerationError, HttpConfig, TokenStream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::streaming::parse_sse_stream;

/// Default chat completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for tag generation.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// HTTP client for OpenAI-compatible chat completion APIs.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    timeout_secs: u64,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

/// Error response from the API
#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIErrorDetail {
    pub(crate) message: String,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    error_type: Option<String>,
}

impl OpenAIClient {
    /// Creates a client for the default endpoint and model.
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_config(api_key, DEFAULT_MODEL, None, HttpConfig::default())
    }

    /// Creates a client with full configuration.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key, sent as a bearer token. May be empty for local servers.
    /// * `model` - Model name
    /// * `endpoint` - Custom chat completions URL (proxies, Azure, local servers)
    /// * `http_config` - Request and connect timeouts
    pub fn with_config(
        api_key: &str,
        model: &str,
        endpoint: Option<&str>,
        http_config: HttpConfig,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(http_config.timeout)
            .connect_timeout(http_config.connect_timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            temperature: 0.2,
            timeout_secs: http_config.timeout.as_secs(),
        })
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the model being used.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Opens a streaming chat completion.
    ///
    /// HTTP errors are mapped before the stream is returned; HTTP 429 (and
    /// error bodies that mention rate limiting) become
    /// [`GenerationError::RateLimited`].
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, GenerationError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: true,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                GenerationError::Network(format!("Cannot connect to {}: {}", self.endpoint, e))
            } else {
                GenerationError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, &error_text, retry_after));
        }

        debug!(model = %self.model, "Chat completion stream opened");
        Ok(parse_sse_stream(response.bytes_stream(), self.timeout_secs))
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn map_error_status(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> GenerationError {
    let message = match serde_json::from_str::<OpenAIError>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited {
            message,
            retry_after,
        },
        StatusCode::UNAUTHORIZED => GenerationError::Remote {
            status: status.as_u16(),
            message: format!("authentication failed: {}. Check your API key.", message),
        },
        _ if mentions_rate_limit(&message) => GenerationError::RateLimited {
            message,
            retry_after,
        },
        _ => GenerationError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

/// Some gateways report throttling with a non-429 status or inside the
/// stream, so the message text is the only signal left.
fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || has_status_429(&lower)
}

/// Matches `429` only as a standalone number, e.g. "HTTP 429" or
/// "status: 429", not inside ids such as "model-1429".
fn has_status_429(message: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == "429")
}

/// Maps an error reported after the stream opened.
pub(crate) fn classify_error_message(message: String) -> GenerationError {
    if mentions_rate_limit(&message) {
        GenerationError::rate_limited(message)
    } else {
        GenerationError::InvalidResponse(message)
    }
}

// =============================================================================
// Trait Implementation: RemoteGenerator
// =============================================================================

impl retag_core::traits::RemoteGenerator for OpenAIClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<TokenStream, GenerationError> {
        self.stream_chat(messages).await
    }
}
