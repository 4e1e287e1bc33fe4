//! Notifier implementations.
//!
//! - **TracingNotifier**: 通知をログに出すだけ（CLI・開発用）
//! - **ChannelNotifier**: mpsc に流す（UI のトースト表示などに接続する）

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Notification, NotificationKind};
use crate::ports::{Notifier, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let action = notification.action.as_ref().map(|a| a.url.as_str());
        match notification.kind {
            NotificationKind::Success => tracing::info!(
                title = %notification.title,
                description = %notification.description,
                action,
                "notification"
            ),
            NotificationKind::Error => tracing::warn!(
                title = %notification.title,
                description = %notification.description,
                action,
                "notification"
            ),
        }
        Ok(())
    }
}

pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification.clone())
            .map_err(|_| NotifyError::Closed)
    }
}
