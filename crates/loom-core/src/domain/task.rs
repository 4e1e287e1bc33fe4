//! Task record: the persisted unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OwnerId, TaskId, TaskKind, TaskOutput, TaskParams, TaskStatus};

/// Attempt budget used when a record does not set one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Persisted state of one background task.
///
/// Design:
/// - Created by the request layer in `Running` before any async work starts.
/// - Mutated only by the executor while it runs, and moved exactly once per
///   pass to `Completed` or `Failed`.
/// - Result fields are set only on success, error fields only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,

    /// Absent for inputs that cannot be persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<TaskParams>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Failed attempts consumed before the final outcome of the pass.
    #[serde(default)]
    pub attempts_used: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_recoverable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        owner_id: OwnerId,
        kind: TaskKind,
        parameters: Option<TaskParams>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            kind,
            status: TaskStatus::Running,
            started_at,
            parameters,
            max_attempts: None,
            attempts_used: 0,
            result_summary: None,
            result_url: None,
            error_message: None,
            error_recoverable: None,
            finished_at: None,
        }
    }

    /// Build a record from typed parameters; the kind is taken from them.
    pub fn from_params(
        id: TaskId,
        owner_id: OwnerId,
        parameters: TaskParams,
        started_at: DateTime<Utc>,
    ) -> Self {
        let kind = parameters.kind();
        Self::new(id, owner_id, kind, Some(parameters), started_at)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Attempt budget for a pass: the stored value, or the default, never below one.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1)
    }

    pub fn is_recoverable_failure(&self) -> bool {
        self.status == TaskStatus::Failed && self.error_recoverable == Some(true)
    }

    pub fn mark_completed(&mut self, output: TaskOutput, attempts_used: u32, at: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.attempts_used = attempts_used;
        self.result_summary = Some(output.summary);
        self.result_url = output.url;
        self.error_message = None;
        self.error_recoverable = None;
        self.finished_at = Some(at);
    }

    pub fn mark_failed(
        &mut self,
        message: String,
        recoverable: bool,
        attempts_used: u32,
        at: DateTime<Utc>,
    ) {
        self.status = TaskStatus::Failed;
        self.attempts_used = attempts_used;
        self.result_summary = None;
        self.result_url = None;
        self.error_message = Some(message);
        self.error_recoverable = Some(recoverable);
        self.finished_at = Some(at);
    }

    /// Reset for a fresh execution pass over the same id.
    pub fn begin_pass(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.started_at = at;
        self.attempts_used = 0;
        self.result_summary = None;
        self.result_url = None;
        self.error_message = None;
        self.error_recoverable = None;
        self.finished_at = None;
    }
}
