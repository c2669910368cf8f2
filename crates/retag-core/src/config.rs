//! Configuration types for regeneration runs and remote calls.
//!
//! Configuration is always a value handed to the component that needs it.
//! Nothing here is global.

use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::error::AppError;

/// Settings for one regeneration run. Immutable for the run's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Number of items generated concurrently per batch. Must be positive.
    pub batch_size: usize,
    /// Sleep between two consecutive batches. Not interrupted by cancellation.
    pub delay_between_batches: Duration,
    /// Failure records with `retry_count >= max_retries` are no longer retried.
    pub max_retries: u32,
    /// Generate and log tags without writing tags or failure records.
    pub preview_mode: bool,
    /// Backoff applied before the inline retry of a rate-limited item.
    pub backoff: BackoffPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_batches: Duration::from_millis(1_000),
            max_retries: 3,
            preview_mode: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl GenerationConfig {
    /// Creates config from environment variables with fallback to defaults.
    ///
    /// Reads `RETAG_BATCH_SIZE`, `RETAG_BATCH_DELAY_MS`, `RETAG_MAX_RETRIES`
    /// and `RETAG_PREVIEW`. Unparseable values fall back silently.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_parse("RETAG_BATCH_SIZE").unwrap_or(defaults.batch_size),
            delay_between_batches: env_parse("RETAG_BATCH_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay_between_batches),
            max_retries: env_parse("RETAG_MAX_RETRIES").unwrap_or(defaults.max_retries),
            preview_mode: env_parse("RETAG_PREVIEW").unwrap_or(defaults.preview_mode),
            backoff: defaults.backoff,
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_delay_between_batches(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_preview_mode(mut self, preview: bool) -> Self {
        self.preview_mode = preview;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::ConfigError(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.backoff.base_delay > self.backoff.cap_delay {
            return Err(AppError::ConfigError(format!(
                "backoff base delay ({:?}) exceeds cap ({:?})",
                self.backoff.base_delay, self.backoff.cap_delay
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// HTTP client configuration for the remote generator.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
