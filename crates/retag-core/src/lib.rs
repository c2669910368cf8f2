//! Retag Core - bulk tag regeneration for bookmarked resources.
//!
//! This crate provides:
//!
//! - **Domain models**: [`WorkItem`], [`FailureRecord`], [`ProgressSnapshot`], [`RunResult`]
//! - **Engine**: [`RegenerationEngine`] for full regeneration and retry-of-failures runs
//! - **Batching**: [`BatchProcessor`] fans generation out over a batch and settles every item
//! - **Traits**: [`ResourceEnumerator`], [`TagStore`], [`FailureStore`], [`RemoteGenerator`]
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging/UI
//!
//! Storage and the remote text generator live behind traits, so the engine is
//! driven by `retag-db` and `retag-client` in production and by in-memory
//! mocks in tests.
//!
//! # Example
//!
//! ```ignore
//! use retag_core::{GenerationConfig, RegenerationEngine, TracingReporter};
//!
//! let engine = RegenerationEngine::new(resources, client, tags, failures, GenerationConfig::default())?;
//! let result = engine.regenerate_all(&TracingReporter).await?;
//! println!("{} of {} tagged", result.successful, result.total);
//! ```

pub mod backoff;
pub mod batch;
pub mod config;
pub mod error;
pub mod generator;
pub mod models;
pub mod progress;
pub mod regenerate;
pub mod traits;

// Configuration
pub use backoff::BackoffPolicy;
pub use config::{GenerationConfig, HttpConfig};

// Error handling
pub use error::{AppError, GenerationError};

// Domain models
pub use models::{
    ChatMessage, ChatRole, FailureRecord, ProgressSnapshot, RunResult, RunStatus, TagAssignment,
    WorkItem,
};

// Progress reporting
pub use progress::{ProgressReporter, SilentReporter, TracingReporter};

// Services
pub use batch::{BatchOutcome, BatchProcessor, ItemOutcome};
pub use generator::{TagGenerator, parse_tags};
pub use regenerate::{RegenerationEngine, RunCanceller};

// Traits
pub use traits::{FailureStore, RemoteGenerator, ResourceEnumerator, TagStore, TokenStream};

// Re-export for callers that drive cancellation themselves
pub use tokio_util::sync::CancellationToken;
