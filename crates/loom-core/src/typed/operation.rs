//! Operation traits: the real unit of work, and the compensating hook.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{TaskError, TaskOutput, TaskRecord};

/// One task's unit of work. Called once per attempt, so it must be
/// repeatable.
///
/// Closures returning a future implement this directly:
/// ```ignore
/// let op = || async { Ok(TaskOutput::new("done")) };
/// ```
#[async_trait]
pub trait TaskOperation: Send + Sync {
    async fn run(&self) -> Result<TaskOutput, TaskError>;
}

#[async_trait]
impl<F, Fut> TaskOperation for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskOutput, TaskError>> + Send + 'static,
{
    async fn run(&self) -> Result<TaskOutput, TaskError> {
        (self)().await
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failure hook: {0}")]
pub struct HookError(pub String);

/// Compensating write invoked once when a pass ends in `Failed`.
///
/// Used by kinds whose companion record would otherwise stay "pending"
/// forever. Errors are logged by the executor, never propagated.
#[async_trait]
pub trait FailureHook: Send + Sync {
    async fn on_failure(&self, task: &TaskRecord) -> Result<(), HookError>;
}
