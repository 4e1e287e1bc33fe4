//! Ports - 抽象化レイヤー
//!
//! executor / dispatcher が外部と接する trait をここに集める。
//! 実装は `impls`（開発用・テスト用）か、アプリケーション側に置く。

pub mod cancellation;
pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod task_store;

pub use self::cancellation::CancellationCheck;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{Notifier, NotifyError};
pub use self::task_store::{StoreError, TaskStore};
