//! CancellationCheck port - 試行前のキャンセル確認（任意）
//!
//! executor は各 attempt の直前にこれを参照する。キャンセル済みなら
//! completed / failed を書かず、通知も出さずに即座に止まる。

use async_trait::async_trait;

use crate::domain::TaskId;

#[async_trait]
pub trait CancellationCheck: Send + Sync {
    async fn is_cancelled(&self, task_id: TaskId) -> bool;
}
