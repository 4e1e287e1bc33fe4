//! Impls - ports の実装（開発用・テスト用）
//!
//! 本番用の実装（DB に載せた TaskStore、プッシュ通知など）はアプリケーション側に置く。

pub mod memory_store;
pub mod notifiers;

pub use self::memory_store::{InMemoryTaskStore, TaskCounts};
pub use self::notifiers::{ChannelNotifier, TracingNotifier};
