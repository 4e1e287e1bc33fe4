//! Rebuild trait - 保存済みパラメータから operation を再構築する
//!
//! # 二層構造
//! - `Rebuild<P>`: kind ごとの型付き実装（P は `KindParams`）
//! - `DynRebuilder`: object-safe な抽象化（`TypedRebuilder<P, R>` で型消去）

use std::marker::PhantomData;
use std::sync::Arc;

use super::kind::KindParams;
use super::operation::{FailureHook, TaskOperation};
use crate::domain::{OwnerId, TaskKind, TaskParams};

/// A reconstructed operation, ready to hand to the executor.
pub struct Rebuilt {
    pub operation: Arc<dyn TaskOperation>,
    pub on_failure: Option<Arc<dyn FailureHook>>,
}

impl Rebuilt {
    pub fn new(operation: Arc<dyn TaskOperation>) -> Self {
        Self {
            operation,
            on_failure: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: Arc<dyn FailureHook>) -> Self {
        self.on_failure = Some(hook);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RebuildError {
    #[error("{0} tasks cannot be redispatched: their input is not persisted")]
    NotRedispatchable(TaskKind),

    #[error("no rebuilder registered for {0}")]
    NoRebuilder(TaskKind),

    #[error("{0} task has no stored parameters")]
    MissingParameters(TaskKind),

    #[error("stored parameters are for {found}, expected {expected}")]
    KindMismatch { expected: TaskKind, found: TaskKind },

    #[error("{kind} task is missing required parameter '{key}'")]
    MissingParameter { kind: TaskKind, key: &'static str },

    #[error("{0}")]
    Unavailable(String),
}

/// Typed reconstruction for one kind.
///
/// `params` has already been checked for missing keys.
pub trait Rebuild<P: KindParams>: Send + Sync {
    fn rebuild(&self, params: P, owner: &OwnerId) -> Result<Rebuilt, RebuildError>;
}

impl<P, F> Rebuild<P> for F
where
    P: KindParams,
    F: Fn(P, &OwnerId) -> Result<Rebuilt, RebuildError> + Send + Sync,
{
    fn rebuild(&self, params: P, owner: &OwnerId) -> Result<Rebuilt, RebuildError> {
        (self)(params, owner)
    }
}

/// Object-safe rebuilder, stored in the registry as `Arc<dyn DynRebuilder>`.
pub trait DynRebuilder: Send + Sync {
    fn kind(&self) -> TaskKind;

    fn rebuild_dyn(&self, params: &TaskParams, owner: &OwnerId) -> Result<Rebuilt, RebuildError>;
}

pub struct TypedRebuilder<P: KindParams, R: Rebuild<P>> {
    rebuilder: R,
    _marker: PhantomData<fn() -> P>,
}

impl<P: KindParams, R: Rebuild<P>> TypedRebuilder<P, R> {
    pub fn new(rebuilder: R) -> Self {
        Self {
            rebuilder,
            _marker: PhantomData,
        }
    }
}

impl<P: KindParams, R: Rebuild<P>> DynRebuilder for TypedRebuilder<P, R> {
    fn kind(&self) -> TaskKind {
        P::KIND
    }

    fn rebuild_dyn(&self, params: &TaskParams, owner: &OwnerId) -> Result<Rebuilt, RebuildError> {
        let typed = P::from_params(params).ok_or(RebuildError::KindMismatch {
            expected: P::KIND,
            found: params.kind(),
        })?;
        if let Some(key) = params.missing_key() {
            return Err(RebuildError::MissingParameter { kind: P::KIND, key });
        }
        self.rebuilder.rebuild(typed.clone(), owner)
    }
}
