//! Domain models for tag regeneration runs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A taggable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub url: String,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    /// Only items with a non-blank url can be tagged.
    pub fn is_eligible(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Human-readable label for progress output: the title, or the url when
    /// the title is blank.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Tags generated for one resource, keyed by url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub url: String,
    pub tags: Vec<String>,
}

/// Durable record of a failed generation attempt.
///
/// Drives eligibility for later `retry_failed` runs. Keyed by url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub resource_id: String,
    pub reason: String,
    pub first_failure_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl FailureRecord {
    /// Builds the record to persist after a failure.
    ///
    /// With no previous record this is the first failure (`retry_count = 1`,
    /// no `last_retry_at`). Otherwise `first_failure_at` is carried over,
    /// `retry_count` increments and `last_retry_at` is set to `now`.
    pub fn after_failure(
        previous: Option<&FailureRecord>,
        item: &WorkItem,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        match previous {
            Some(prev) => Self {
                url: item.url.clone(),
                resource_id: item.id.clone(),
                reason: reason.into(),
                first_failure_at: prev.first_failure_at,
                retry_count: prev.retry_count.saturating_add(1),
                last_retry_at: Some(now),
            },
            None => Self {
                url: item.url.clone(),
                resource_id: item.id.clone(),
                reason: reason.into(),
                first_failure_at: now,
                retry_count: 1,
                last_retry_at: None,
            },
        }
    }

    /// Returns true if a retry run may still pick this record up.
    pub fn is_retriable(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }
}

/// Status carried by every progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true for `Completed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable point-in-time view of a run's counters.
///
/// Invariants at every emission: `processed == successful + failed` and
/// `processed <= total`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub current_label: Option<String>,
    pub status: RunStatus,
}

impl ProgressSnapshot {
    pub(crate) fn new(
        total: usize,
        successful: usize,
        failed: usize,
        current_label: Option<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            total,
            processed: successful + failed,
            successful,
            failed,
            current_label,
            status,
        }
    }
}

/// Terminal summary of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl RunResult {
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message sent to the remote generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}
