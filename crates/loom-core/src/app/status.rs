//! Status - ポーリング用のタスク表示
//!
//! `TaskRecord` から UI が欲しい形だけを取り出す。`can_retry` は
//! 「retry ボタンを出してよいか」をそのまま表す。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskKind, TaskRecord, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub kind: TaskKind,
    pub label: String,
    pub status: TaskStatus,
    pub attempts_used: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub can_retry: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&TaskRecord> for TaskView {
    fn from(task: &TaskRecord) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            label: task.kind.label().to_string(),
            status: task.status,
            attempts_used: task.attempts_used,
            max_attempts: task.effective_max_attempts(),
            summary: task.result_summary.clone(),
            url: task.result_url.clone(),
            error: task.error_message.clone(),
            can_retry: task.is_recoverable_failure() && task.kind.supports_redispatch(),
            started_at: task.started_at,
            finished_at: task.finished_at,
        }
    }
}
