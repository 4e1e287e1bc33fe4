//! TaskStore port - task record の正本（source of truth）
//!
//! # 設計原則
//! - 同じ id については read-after-write の一貫性を前提とする
//! - 楽観的ロックは行わない（last writer wins）
//! - 削除はしない（保持期間は外部の関心事）

use async_trait::async_trait;

use crate::domain::{TaskId, TaskRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or overwrite the record with `task.id`.
    async fn save(&self, task: &TaskRecord) -> Result<(), StoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;
}
