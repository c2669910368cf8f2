use std::time::Duration;

use thiserror::Error;

/// Run-level error types.
///
/// These are the only errors that reject a regeneration run. Per-item
/// generation failures are [`GenerationError`]s; they are recorded in the
/// failure store and counted, but never surface here.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use retag_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures, query
    /// errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A store (resource, tag, or failure) could not be read or written.
    #[error("Store error: {0}")]
    StoreError(String),

    /// HTTP client could not be constructed or configured.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A run is already active on this engine instance.
    #[error("A regeneration run is already in progress")]
    RunInProgress,

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ConfigError(msg) => {
                format!("Configuration error: {}\n   Check your environment and flags.", msg)
            }
            AppError::RunInProgress => {
                "Another regeneration run is still active. Wait for it to finish or cancel it."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Item-level failure of a single tag generation.
///
/// Rate limiting is a distinct variant so the batch processor can drive its
/// backoff branch from the type instead of from message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The remote service refused the call because of rate limiting.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// Server-provided `Retry-After` hint, if any. Informational only:
        /// the inline retry always waits `BackoffPolicy::delay(0)`.
        retry_after: Option<Duration>,
    },

    /// The remote service returned an error response.
    #[error("Remote generator error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote call exceeded the client timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The response stream could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The response parsed to zero usable tags.
    #[error("Generated tag list is empty")]
    EmptyResult,
}

impl GenerationError {
    /// Creates a rate-limit error without a retry hint.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Returns true if this failure should trigger the inline backoff retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use retag_core::error::GenerationError;
    ///
    /// assert!(GenerationError::rate_limited("slow down").is_rate_limited());
    /// assert!(!GenerationError::EmptyResult.is_rate_limited());
    /// ```
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}
