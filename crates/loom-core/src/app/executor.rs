//! TaskExecutor - 1 タスク 1 パスの実行
//!
//! # フロー
//! 1. operation を Retrier に通す（attempt 予算は `task.effective_max_attempts()`）
//! 2. 終端状態（completed / failed）を TaskStore に保存
//! 3. failed なら failure hook（任意）を呼ぶ
//! 4. 通知を送る（失敗はログに残して握りつぶす）
//!
//! executor 自身はスケジューリングしない。detached に走らせるかどうかは
//! 呼び出し側（`TaskLauncher`）が決める。

use std::sync::Arc;

use tracing::Instrument;

use crate::config::EngineConfig;
use crate::domain::{Notification, TaskError, TaskId, TaskOutput, TaskRecord, TaskStatus};
use crate::ports::{CancellationCheck, Clock, Notifier, StoreError, TaskStore};
use crate::retry::{Attempted, Retrier, RetryError};
use crate::typed::{FailureHook, TaskOperation};

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { attempts_used: u32 },
    Failed { attempts_used: u32, recoverable: bool },
    /// Stopped by the cancellation check; nothing was written or sent.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("task {id} is already {status:?}; a new pass must start from running")]
    NotRunning { id: TaskId, status: TaskStatus },

    #[error("terminal state of task {id} could not be saved: {source}")]
    Store {
        id: TaskId,
        #[source]
        source: StoreError,
    },
}

pub struct TaskExecutor {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    retrier: Retrier,
    config: EngineConfig,
    cancellation: Option<Arc<dyn CancellationCheck>>,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            retrier: Retrier::new(config.retry_policy()),
            config,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, check: Arc<dyn CancellationCheck>) -> Self {
        self.cancellation = Some(check);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one execution pass of `task`.
    ///
    /// Returns an error only when the record is not running or its terminal
    /// state could not be persisted. Notifier and hook failures are logged.
    pub async fn execute(
        &self,
        task: TaskRecord,
        log_label: &str,
        operation: &dyn TaskOperation,
        on_failure: Option<&dyn FailureHook>,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let span = tracing::info_span!(
            "task",
            task_id = %task.id,
            kind = %task.kind,
            label = log_label,
        );
        self.run_pass(task, operation, on_failure)
            .instrument(span)
            .await
    }

    async fn run_pass(
        &self,
        mut task: TaskRecord,
        operation: &dyn TaskOperation,
        on_failure: Option<&dyn FailureHook>,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        if task.status.is_terminal() {
            return Err(ExecuteError::NotRunning {
                id: task.id,
                status: task.status,
            });
        }

        let task_id = task.id;
        let max_attempts = task.effective_max_attempts();
        tracing::info!(max_attempts, "task started");

        let result = self
            .retrier
            .run_guarded(max_attempts, || self.is_cancelled(task_id), || operation.run())
            .await;

        match result {
            Ok(attempted) => self.complete(task, attempted).await,
            Err(RetryError::Cancelled { attempts }) => {
                tracing::info!(attempts, "task cancelled; record left untouched");
                Ok(ExecutionOutcome::Cancelled)
            }
            Err(RetryError::Failed {
                error,
                attempts,
                stop,
            }) => {
                self.fail(task, error, attempts, stop.is_recoverable(), on_failure)
                    .await
            }
        }
    }

    async fn is_cancelled(&self, task_id: TaskId) -> bool {
        match &self.cancellation {
            Some(check) => check.is_cancelled(task_id).await,
            None => false,
        }
    }

    async fn complete(
        &self,
        mut task: TaskRecord,
        attempted: Attempted<TaskOutput>,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let attempts_used = attempted.failed_attempts;
        let output = attempted.value;
        let mut notification =
            Notification::success(format!("{} complete", task.kind.label()), &output.summary);
        if let Some(url) = &output.url {
            notification = notification.with_action("View", url);
        }

        task.mark_completed(output, attempts_used, self.clock.now());
        if let Err(source) = self.store.save(&task).await {
            return Err(self.unsaved(&task, source).await);
        }
        tracing::info!(attempts_used, "task completed");

        self.deliver(&notification).await;
        Ok(ExecutionOutcome::Completed { attempts_used })
    }

    async fn fail(
        &self,
        mut task: TaskRecord,
        error: TaskError,
        attempts_used: u32,
        recoverable: bool,
        on_failure: Option<&dyn FailureHook>,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let message = error.to_string();
        task.mark_failed(message.clone(), recoverable, attempts_used, self.clock.now());
        let saved = self.store.save(&task).await;
        tracing::warn!(attempts_used, recoverable, error = %message, "task failed");

        // the dependent entity is resolved even when the record itself could not be saved
        if let Some(hook) = on_failure
            && let Err(err) = hook.on_failure(&task).await
        {
            tracing::error!(error = %err, "failure hook did not complete");
        }
        if let Err(source) = saved {
            return Err(self.unsaved(&task, source).await);
        }

        let mut notification =
            Notification::error(format!("{} failed", task.kind.label()), message);
        if recoverable && task.kind.supports_redispatch() {
            notification = notification.with_action("Retry", self.config.retry_url(task.id));
        }
        self.deliver(&notification).await;

        Ok(ExecutionOutcome::Failed {
            attempts_used,
            recoverable,
        })
    }

    /// The terminal record could not be saved. The user still gets one error
    /// notification, without a retry action, and the error propagates.
    async fn unsaved(&self, task: &TaskRecord, source: StoreError) -> ExecuteError {
        tracing::error!(error = %source, status = ?task.status, "terminal state not saved");
        let notification = Notification::error(
            format!("{} failed", task.kind.label()),
            "The result could not be saved. Please start the task again.",
        );
        self.deliver(&notification).await;
        ExecuteError::Store {
            id: task.id,
            source,
        }
    }

    async fn deliver(&self, notification: &Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::error!(error = %err, title = %notification.title, "notification not delivered");
        }
    }
}
