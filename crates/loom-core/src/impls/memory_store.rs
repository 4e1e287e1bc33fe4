//! InMemoryTaskStore - 開発用・テスト用の正本
//!
//! `tokio::sync::Mutex` で HashMap を守る。ロックは各メソッド内で完結し、
//! await を跨いで保持しない。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{OwnerId, TaskId, TaskRecord, TaskStatus};
use crate::ports::{StoreError, TaskStore};

/// Number of records per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    records: Arc<Mutex<HashMap<TaskId, TaskRecord>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts_by_status(&self) -> TaskCounts {
        let records = self.records.lock().await;
        let mut counts = TaskCounts::default();
        for record in records.values() {
            match record.status {
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Records of one owner, oldest first.
    pub async fn list_by_owner(&self, owner: &OwnerId) -> Vec<TaskRecord> {
        let records = self.records.lock().await;
        let mut owned: Vec<_> = records
            .values()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by_key(|r| (r.started_at, r.id));
        owned
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(&id).cloned())
    }
}
