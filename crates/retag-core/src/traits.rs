//! Trait definitions for external collaborators.
//!
//! The engine only talks to storage and to the remote text generator through
//! these traits, so the core can be driven by PostgreSQL and an HTTP client in
//! production and by in-memory mocks in tests.
//!
//! # Example
//!
//! ```
//! use retag_core::traits::ResourceEnumerator;
//! use retag_core::AppError;
//!
//! async fn count_eligible<E: ResourceEnumerator>(resources: &E) -> Result<usize, AppError> {
//!     let items = resources.list_resources().await?;
//!     Ok(items.iter().filter(|item| item.is_eligible()).count())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use crate::error::GenerationError;
use crate::{AppError, ChatMessage, FailureRecord, TagAssignment, WorkItem};

/// Stream of text chunks produced by a streaming remote call.
///
/// Each item is one content delta. A mid-stream error ends the generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Source of taggable resources.
pub trait ResourceEnumerator: Send + Sync + Clone {
    /// Lists every resource currently known. Eligibility filtering and
    /// de-duplication happen in the engine.
    fn list_resources(&self) -> impl Future<Output = Result<Vec<WorkItem>, AppError>> + Send;
}

/// Durable tag storage, keyed by resource url.
pub trait TagStore: Send + Sync + Clone {
    /// Writes tag lists, replacing whatever each url had before.
    fn batch_put(
        &self,
        assignments: &[TagAssignment],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns the distinct set of tags already in use, sorted.
    ///
    /// Fed into prompts so generated tags stay consistent across resources.
    fn vocabulary(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Durable failure bookkeeping, keyed by resource url.
///
/// Concurrent writes for different urls within one batch must not interfere.
pub trait FailureStore: Send + Sync + Clone {
    fn get(&self, url: &str)
    -> impl Future<Output = Result<Option<FailureRecord>, AppError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<FailureRecord>, AppError>> + Send;

    /// Inserts or replaces the record for `record.url`.
    fn put(&self, record: &FailureRecord) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Removes the record for `url`. Succeeds when there is none.
    fn delete(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Streaming text generation service.
///
/// Errors detected before the stream opens (HTTP status, connection) are
/// returned directly. Rate limiting must be reported as
/// [`GenerationError::RateLimited`] so the batch processor can back off.
pub trait RemoteGenerator: Send + Sync + Clone {
    fn generate(
        &self,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<TokenStream, GenerationError>> + Send;
}
