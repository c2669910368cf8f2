//! Concurrent processing of one batch of work items.
//!
//! Every item in a batch is generated concurrently and settles on its own: a
//! failing item never aborts its siblings. Each outcome is persisted
//! independently (tags plus failure-record cleanup on success, an updated
//! failure record on failure) before the batch's counts are returned.
//!
//! Cancellation is checked immediately before an item starts. Calls already
//! in flight always run to completion.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::error::GenerationError;
use crate::generator::TagGenerator;
use crate::traits::{FailureStore, RemoteGenerator, TagStore};
use crate::{FailureRecord, TagAssignment, WorkItem};

/// Outcome of a single item within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Failed,
    /// Not started because the run was cancelled first.
    Skipped,
}

/// Aggregated counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchOutcome {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.successful += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

impl FromIterator<ItemOutcome> for BatchOutcome {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut outcome = BatchOutcome::default();
        for item in iter {
            outcome.record(item);
        }
        outcome
    }
}

/// Fans item generation out over a batch and records every result.
#[derive(Debug, Clone)]
pub struct BatchProcessor<G, T, F> {
    generator: TagGenerator<G>,
    tag_store: T,
    failure_store: F,
    backoff: BackoffPolicy,
    preview_mode: bool,
}

impl<G, T, F> BatchProcessor<G, T, F>
where
    G: RemoteGenerator,
    T: TagStore,
    F: FailureStore,
{
    pub fn new(
        generator: TagGenerator<G>,
        tag_store: T,
        failure_store: F,
        backoff: BackoffPolicy,
        preview_mode: bool,
    ) -> Self {
        Self {
            generator,
            tag_store,
            failure_store,
            backoff,
            preview_mode,
        }
    }

    /// Processes all `items` concurrently and waits for every one to settle.
    ///
    /// Never fails: per-item errors are recorded and counted.
    pub async fn process(
        &self,
        items: &[WorkItem],
        vocabulary: &[String],
        cancel_token: &CancellationToken,
    ) -> BatchOutcome {
        let concurrency = items.len().max(1);

        let outcome: BatchOutcome = stream::iter(items)
            .map(|item| self.process_item(item, vocabulary, cancel_token))
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        debug!(
            successful = outcome.successful,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Batch settled"
        );
        outcome
    }

    async fn process_item(
        &self,
        item: &WorkItem,
        vocabulary: &[String],
        cancel_token: &CancellationToken,
    ) -> ItemOutcome {
        if cancel_token.is_cancelled() {
            debug!(url = %item.url, "Cancelled before start, skipping item");
            return ItemOutcome::Skipped;
        }

        match self.generate_with_backoff(item, vocabulary).await {
            Ok(tags) => self.record_success(item, tags).await,
            Err(e) => {
                self.record_failure(item, &e.to_string()).await;
                ItemOutcome::Failed
            }
        }
    }

    /// Runs the generator, retrying once after a backoff delay when the
    /// first attempt was rate limited.
    async fn generate_with_backoff(
        &self,
        item: &WorkItem,
        vocabulary: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        match self.generator.generate(item, vocabulary).await {
            Err(e) if e.is_rate_limited() => {
                let delay = self.backoff.delay(0);
                warn!(
                    url = %item.url,
                    error = %e,
                    delay = ?delay,
                    "Rate limited, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                self.generator.generate(item, vocabulary).await
            }
            other => other,
        }
    }

    async fn record_success(&self, item: &WorkItem, tags: Vec<String>) -> ItemOutcome {
        if self.preview_mode {
            info!(url = %item.url, tags = %tags.join(", "), "Preview: generated tags");
            return ItemOutcome::Succeeded;
        }

        let assignment = TagAssignment {
            url: item.url.clone(),
            tags,
        };
        if let Err(e) = self.tag_store.batch_put(std::slice::from_ref(&assignment)).await {
            self.record_failure(item, &format!("Failed to save tags: {}", e))
                .await;
            return ItemOutcome::Failed;
        }

        if let Err(e) = self.failure_store.delete(&item.url).await {
            warn!(url = %item.url, error = %e, "Failed to clear failure record");
        }
        debug!(url = %item.url, tags = ?assignment.tags, "Tags saved");
        ItemOutcome::Succeeded
    }

    async fn record_failure(&self, item: &WorkItem, reason: &str) {
        warn!(url = %item.url, title = %item.title, reason, "Tag generation failed");
        if self.preview_mode {
            return;
        }

        // Without the stored record a write would reset retry_count and
        // first_failure_at, so leave it untouched.
        let previous = match self.failure_store.get(&item.url).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(
                    url = %item.url,
                    error = %e,
                    "Failed to read failure record, leaving it unchanged"
                );
                return;
            }
        };
        let record = FailureRecord::after_failure(previous.as_ref(), item, reason, Utc::now());
        if let Err(e) = self.failure_store.put(&record).await {
            warn!(url = %item.url, error = %e, "Failed to write failure record");
        }
    }
}
