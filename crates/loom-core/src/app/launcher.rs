//! TaskLauncher - record を作って executor を detached に走らせる
//!
//! リクエスト処理側の役割:
//! 1. id を採番し、`running` の record を保存する（非同期処理より先に）
//! 2. `tokio::spawn` で executor を起動し、すぐに TaskId を返す
//!
//! JoinHandle は保持しておき、`wait_idle()` でテストや shutdown 時に待てる。

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::executor::TaskExecutor;
use crate::domain::{OwnerId, TaskId, TaskKind, TaskParams, TaskRecord};
use crate::ports::{Clock, IdGenerator, StoreError, TaskStore};
use crate::typed::{FailureHook, TaskOperation};

/// What the request layer knows when it starts a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner: OwnerId,
    pub kind: TaskKind,
    pub parameters: Option<TaskParams>,
    pub max_attempts: Option<u32>,
}

impl NewTask {
    pub fn new(owner: OwnerId, parameters: TaskParams) -> Self {
        Self {
            owner,
            kind: parameters.kind(),
            parameters: Some(parameters),
            max_attempts: None,
        }
    }

    /// A task whose input cannot be stored on the record.
    pub fn without_parameters(owner: OwnerId, kind: TaskKind) -> Self {
        Self {
            owner,
            kind,
            parameters: None,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("parameters are for {found}, task kind is {expected}")]
    KindMismatch { expected: TaskKind, found: TaskKind },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TaskLauncher {
    executor: Arc<TaskExecutor>,
    store: Arc<dyn TaskStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    default_max_attempts: u32,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskLauncher {
    pub fn new(
        executor: Arc<TaskExecutor>,
        store: Arc<dyn TaskStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let default_max_attempts = executor.config().default_max_attempts;
        Self {
            executor,
            store,
            ids,
            clock,
            default_max_attempts,
            joins: Mutex::new(Vec::new()),
        }
    }

    /// Persist a running record for `request` and start its first pass.
    pub async fn launch(
        &self,
        request: NewTask,
        operation: Arc<dyn TaskOperation>,
        on_failure: Option<Arc<dyn FailureHook>>,
    ) -> Result<TaskId, LaunchError> {
        if let Some(params) = &request.parameters
            && params.kind() != request.kind
        {
            return Err(LaunchError::KindMismatch {
                expected: request.kind,
                found: params.kind(),
            });
        }

        let record = TaskRecord::new(
            self.ids.generate_task_id(),
            request.owner,
            request.kind,
            request.parameters,
            self.clock.now(),
        )
        .with_max_attempts(request.max_attempts.unwrap_or(self.default_max_attempts));
        let id = record.id;

        self.store.save(&record).await?;
        tracing::info!(task_id = %id, kind = %record.kind, "task launched");
        self.spawn(record, operation, on_failure).await;
        Ok(id)
    }

    /// Start a fresh pass over an existing record, keeping its id.
    pub async fn relaunch(
        &self,
        mut record: TaskRecord,
        operation: Arc<dyn TaskOperation>,
        on_failure: Option<Arc<dyn FailureHook>>,
    ) -> Result<(), StoreError> {
        record.begin_pass(self.clock.now());
        self.store.save(&record).await?;
        tracing::info!(task_id = %record.id, kind = %record.kind, "task relaunched");
        self.spawn(record, operation, on_failure).await;
        Ok(())
    }

    async fn spawn(
        &self,
        record: TaskRecord,
        operation: Arc<dyn TaskOperation>,
        on_failure: Option<Arc<dyn FailureHook>>,
    ) {
        let executor = Arc::clone(&self.executor);
        let label = format!("{} {}", record.kind.label(), record.id);

        let join = tokio::spawn(async move {
            if let Err(err) = executor
                .execute(record, &label, operation.as_ref(), on_failure.as_deref())
                .await
            {
                tracing::error!(error = %err, label = %label, "task pass aborted");
            }
        });

        let mut joins = self.joins.lock().await;
        joins.retain(|j| !j.is_finished());
        joins.push(join);
    }

    /// Wait until every spawned pass (including ones started meanwhile) has ended.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<_> = std::mem::take(&mut *self.joins.lock().await);
            if pending.is_empty() {
                break;
            }
            for join in pending {
                // a panicking operation must not take the launcher down with it
                if let Err(err) = join.await {
                    tracing::error!(error = %err, "task pass panicked");
                }
            }
        }
    }
}
