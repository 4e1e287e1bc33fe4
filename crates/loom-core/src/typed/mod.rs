//! Typed - 型付き rebuild API
//!
//! kind とパラメータ型の対応を型で保証し、保存済みパラメータから
//! operation を組み立て直す。
//!
//! # 二層構造
//! - **表層（Typed）**: `KindParams` trait, `Rebuild<P>` trait - 型安全
//! - **内部（Dyn）**: `DynRebuilder` trait - object-safe, type erasure

pub mod kind;
pub mod operation;
pub mod rebuild;
pub mod registry;

pub use self::kind::KindParams;
pub use self::operation::{FailureHook, HookError, TaskOperation};
pub use self::rebuild::{DynRebuilder, Rebuild, RebuildError, Rebuilt, TypedRebuilder};
pub use self::registry::{RebuildRegistry, RegistryError};
