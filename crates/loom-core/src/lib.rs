//! loom-core
//!
//! Background task execution with classified retries.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_kind, params, task, errors, notification）
//! - **ports**: 抽象化レイヤー（TaskStore, Notifier, Clock, IdGenerator, CancellationCheck）
//! - **retry**: RetryPolicy と Retrier（transient だけを backoff 付きで再試行）
//! - **typed**: TaskOperation / FailureHook と kind ごとの rebuilder 登録表
//! - **app**: executor, launcher, dispatcher, builder
//! - **impls**: 実装（InMemoryTaskStore, TracingNotifier, ChannelNotifier）
//! - **config**: EngineConfig（`LOOM_*` 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod retry;
pub mod typed;

#[cfg(test)]
mod testing;
