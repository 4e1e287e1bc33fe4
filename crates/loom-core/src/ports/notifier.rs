//! Notifier port - ユーザーへの通知
//!
//! 通知の失敗は executor が握りつぶしてログに残す。
//! task record は通知より先に保存済みなので、通知基盤の障害で終端状態は失われない。

use async_trait::async_trait;

use crate::domain::Notification;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    Closed,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}
