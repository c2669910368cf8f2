//! Retag Client - HTTP client for the remote tag generator.
//!
//! - [`openai`] - OpenAI-compatible streaming chat completions
//! - [`streaming`] - SSE decoding of the response body
//!
//! The client implements [`retag_core::traits::RemoteGenerator`], mapping
//! HTTP 429 to [`retag_core::GenerationError::RateLimited`] so the engine's
//! backoff is driven by the error type.

pub mod openai;
pub mod streaming;

pub use openai::OpenAIClient;
