//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task record.
///
/// State transitions (per execution pass):
/// - Running -> Completed
/// - Running -> Failed
///
/// Failed -> Running only happens when a redispatch starts a new pass over
/// the same id; the executor never moves a record out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}
