//! Bulk tag regeneration engine.
//!
//! # Architecture
//!
//! [`RegenerationEngine`] is generic over the four collaborators in
//! [`crate::traits`]:
//! - [`ResourceEnumerator`] lists taggable resources
//! - [`RemoteGenerator`] produces tag text for one resource
//! - [`TagStore`] persists generated tags
//! - [`FailureStore`] tracks failed resources between runs
//!
//! # Runs
//!
//! Two entry points share one batch loop:
//! - [`RegenerationEngine::regenerate_all`] retags every eligible resource
//! - [`RegenerationEngine::retry_failed`] retags only resources whose failure
//!   record is still under `max_retries`
//!
//! Work items are enumerated once, split into batches of `batch_size`, and
//! each batch is processed concurrently by a [`BatchProcessor`]. Batches run
//! sequentially with `delay_between_batches` in between. A progress snapshot
//! is emitted before the first batch, after each batch and at termination.
//!
//! # Cancellation
//!
//! Only one run may be active per engine. [`RegenerationEngine::cancel`] (or a
//! [`RunCanceller`] handle) flags the active run. The flag is observed at
//! batch boundaries and before each item starts; in-flight remote calls are
//! never aborted, and the inter-batch delay is not interrupted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::BatchProcessor;
use crate::generator::TagGenerator;
use crate::progress::ProgressReporter;
use crate::traits::{FailureStore, RemoteGenerator, ResourceEnumerator, TagStore};
use crate::{
    AppError, FailureRecord, GenerationConfig, ProgressSnapshot, RunResult, RunStatus, WorkItem,
};

type ActiveRun = Arc<Mutex<Option<CancellationToken>>>;

fn lock_active(active: &ActiveRun) -> MutexGuard<'_, Option<CancellationToken>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle that cancels whichever run is active on its engine.
///
/// Cheap to clone and safe to move into signal handlers or progress
/// reporters.
#[derive(Debug, Clone)]
pub struct RunCanceller {
    active: ActiveRun,
}

impl RunCanceller {
    /// Requests cancellation of the active run.
    ///
    /// Returns `false` if no run was active.
    pub fn cancel(&self) -> bool {
        match lock_active(&self.active).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Marks a run as active for as long as it lives.
struct RunGuard {
    active: ActiveRun,
    token: CancellationToken,
}

impl RunGuard {
    fn acquire(active: &ActiveRun) -> Result<Self, AppError> {
        let mut slot = lock_active(active);
        if slot.is_some() {
            return Err(AppError::RunInProgress);
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Ok(Self {
            active: Arc::clone(active),
            token,
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *lock_active(&self.active) = None;
    }
}

/// Orchestrates batched tag regeneration with failure bookkeeping.
pub struct RegenerationEngine<E, G, T, F> {
    resources: E,
    tag_store: T,
    failure_store: F,
    processor: BatchProcessor<G, T, F>,
    config: GenerationConfig,
    active: ActiveRun,
}

impl<E, G, T, F> RegenerationEngine<E, G, T, F>
where
    E: ResourceEnumerator,
    G: RemoteGenerator,
    T: TagStore,
    F: FailureStore,
{
    /// Creates an engine. The config is validated once here.
    pub fn new(
        resources: E,
        remote: G,
        tag_store: T,
        failure_store: F,
        config: GenerationConfig,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let processor = BatchProcessor::new(
            TagGenerator::new(remote),
            tag_store.clone(),
            failure_store.clone(),
            config.backoff,
            config.preview_mode,
        );
        Ok(Self {
            resources,
            tag_store,
            failure_store,
            processor,
            config,
            active: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Returns a handle that can cancel runs from another task.
    pub fn canceller(&self) -> RunCanceller {
        RunCanceller {
            active: Arc::clone(&self.active),
        }
    }

    /// Cancels the active run. A no-op when nothing is running.
    pub fn cancel(&self) {
        if !self.canceller().cancel() {
            debug!("Cancel requested with no active run");
        }
    }

    pub fn is_running(&self) -> bool {
        lock_active(&self.active).is_some()
    }

    /// Regenerates tags for every eligible resource.
    ///
    /// # Errors
    ///
    /// Fails only if a run is already active or the resources or vocabulary
    /// cannot be read. Per-item failures are counted in the result.
    pub async fn regenerate_all<R: ProgressReporter>(
        &self,
        reporter: &R,
    ) -> Result<RunResult, AppError> {
        let guard = RunGuard::acquire(&self.active)?;

        let listed = self.resources.list_resources().await?;
        let listed_count = listed.len();
        let items = eligible_items(listed);
        if items.len() < listed_count {
            debug!(
                listed = listed_count,
                eligible = items.len(),
                "Dropped ineligible or duplicate resources"
            );
        }
        let vocabulary = self.tag_store.vocabulary().await?;

        info!(
            total = items.len(),
            vocabulary = vocabulary.len(),
            batch_size = self.config.batch_size,
            preview = self.config.preview_mode,
            "Starting full tag regeneration"
        );
        Ok(self
            .run_batches(&items, &vocabulary, &guard.token, reporter)
            .await)
    }

    /// Regenerates tags only for resources with a retriable failure record.
    ///
    /// Records at or above `max_retries` are ignored. Records whose resource
    /// no longer exists are logged and skipped without counting toward the
    /// total. With nothing to retry, a single `completed` snapshot is emitted
    /// and an all-zero result returned.
    pub async fn retry_failed<R: ProgressReporter>(
        &self,
        reporter: &R,
    ) -> Result<RunResult, AppError> {
        let guard = RunGuard::acquire(&self.active)?;

        let records: Vec<FailureRecord> = self
            .failure_store
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.is_retriable(self.config.max_retries))
            .collect();
        if records.is_empty() {
            info!("No retriable failures");
            return Ok(finish_empty(reporter));
        }

        let items = self.resolve_failures(&records).await?;
        if items.is_empty() {
            info!(
                records = records.len(),
                "No retriable failure maps to an existing resource"
            );
            return Ok(finish_empty(reporter));
        }
        let vocabulary = self.tag_store.vocabulary().await?;

        info!(
            total = items.len(),
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            preview = self.config.preview_mode,
            "Retrying failed tag generations"
        );
        Ok(self
            .run_batches(&items, &vocabulary, &guard.token, reporter)
            .await)
    }

    /// Maps failure records back to work items by url.
    async fn resolve_failures(&self, records: &[FailureRecord]) -> Result<Vec<WorkItem>, AppError> {
        let mut by_url: HashMap<String, WorkItem> = HashMap::new();
        for item in eligible_items(self.resources.list_resources().await?) {
            by_url.insert(item.url.clone(), item);
        }

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            match by_url.remove(&record.url) {
                Some(item) => items.push(item),
                None => warn!(
                    url = %record.url,
                    resource_id = %record.resource_id,
                    "Resource for failure record not found, skipping"
                ),
            }
        }
        Ok(items)
    }

    async fn run_batches<R: ProgressReporter>(
        &self,
        items: &[WorkItem],
        vocabulary: &[String],
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> RunResult {
        let total = items.len();
        let mut successful = 0;
        let mut failed = 0;
        let mut last_label: Option<String> = None;

        reporter.report(&ProgressSnapshot::new(total, 0, 0, None, RunStatus::Running));

        let batch_count = total.div_ceil(self.config.batch_size);
        for (index, batch) in items.chunks(self.config.batch_size).enumerate() {
            if cancel_token.is_cancelled() {
                return finish(reporter, total, successful, failed, last_label, true);
            }

            let outcome = self.processor.process(batch, vocabulary, cancel_token).await;
            successful += outcome.successful;
            failed += outcome.failed;
            last_label = batch.last().map(|item| item.label().to_string());

            reporter.report(&ProgressSnapshot::new(
                total,
                successful,
                failed,
                last_label.clone(),
                RunStatus::Running,
            ));

            if outcome.skipped > 0 {
                return finish(reporter, total, successful, failed, last_label, true);
            }

            let has_more = index + 1 < batch_count;
            if has_more && !self.config.delay_between_batches.is_zero() {
                tokio::time::sleep(self.config.delay_between_batches).await;
            }
        }

        finish(reporter, total, successful, failed, last_label, false)
    }
}

/// Eligible items in enumeration order, first occurrence of each url wins.
fn eligible_items(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item.is_eligible() && seen.insert(item.url.clone()))
        .collect()
}

fn finish<R: ProgressReporter>(
    reporter: &R,
    total: usize,
    successful: usize,
    failed: usize,
    last_label: Option<String>,
    cancelled: bool,
) -> RunResult {
    let status = if cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };
    reporter.report(&ProgressSnapshot::new(
        total, successful, failed, last_label, status,
    ));
    info!(
        total,
        successful,
        failed,
        status = %status,
        "Tag regeneration finished"
    );
    RunResult {
        total,
        successful,
        failed,
        cancelled,
    }
}

fn finish_empty<R: ProgressReporter>(reporter: &R) -> RunResult {
    reporter.report(&ProgressSnapshot::new(0, 0, 0, None, RunStatus::Completed));
    RunResult::default()
}
