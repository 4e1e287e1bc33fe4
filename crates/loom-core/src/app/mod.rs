//! App - アプリケーション層
//!
//! ports を組み合わせてタスク実行のフローを実装します。
//!
//! # 主要コンポーネント
//! - **TaskExecutor**: 1 パスの実行（retry → 保存 → hook → 通知）
//! - **TaskLauncher**: record の作成と detached な起動
//! - **TaskDispatcher**: failed タスクの再実行
//! - **EngineBuilder / Engine**: ワイヤリングと起動時検証
//! - **TaskView**: ポーリング用の表示

pub mod builder;
pub mod dispatcher;
pub mod executor;
pub mod launcher;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Engine, EngineBuilder, SubmitError};
pub use self::dispatcher::TaskDispatcher;
pub use self::executor::{ExecuteError, ExecutionOutcome, TaskExecutor};
pub use self::launcher::{LaunchError, NewTask, TaskLauncher};
pub use self::status::TaskView;
