//! RebuildRegistry - kind から rebuilder への対応表
//!
//! 起動時に構築し、実行時は不変（`Arc` で共有）。実行中に書き換えない。

use std::collections::HashMap;
use std::sync::Arc;

use super::kind::KindParams;
use super::rebuild::{DynRebuilder, Rebuild, RebuildError, Rebuilt, TypedRebuilder};
use crate::domain::{OwnerId, TaskKind, TaskParams, TaskRecord};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("rebuilder for task kind '{0}' is already registered")]
    AlreadyRegistered(TaskKind),

    #[error("task kind '{0}' does not support redispatch")]
    NotRedispatchable(TaskKind),
}

#[derive(Default)]
pub struct RebuildRegistry {
    rebuilders: HashMap<TaskKind, Arc<dyn DynRebuilder>>,
}

impl RebuildRegistry {
    pub fn new() -> Self {
        Self {
            rebuilders: HashMap::new(),
        }
    }

    pub fn register<P: KindParams, R: Rebuild<P> + 'static>(
        &mut self,
        rebuilder: R,
    ) -> Result<(), RegistryError> {
        let kind = P::KIND;
        if !kind.supports_redispatch() {
            return Err(RegistryError::NotRedispatchable(kind));
        }
        if self.rebuilders.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.rebuilders
            .insert(kind, Arc::new(TypedRebuilder::<P, R>::new(rebuilder)));
        Ok(())
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn DynRebuilder>> {
        self.rebuilders.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.rebuilders.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Build the operation for fresh `params`.
    pub fn rebuild_params(
        &self,
        params: &TaskParams,
        owner: &OwnerId,
    ) -> Result<Rebuilt, RebuildError> {
        let kind = params.kind();
        if !kind.supports_redispatch() {
            return Err(RebuildError::NotRedispatchable(kind));
        }
        let rebuilder = self.get(kind).ok_or(RebuildError::NoRebuilder(kind))?;
        rebuilder.rebuild_dyn(params, owner)
    }

    /// Rebuild the operation of a stored record from its parameters alone.
    pub fn rebuild_record(
        &self,
        task: &TaskRecord,
        owner: &OwnerId,
    ) -> Result<Rebuilt, RebuildError> {
        if !task.kind.supports_redispatch() {
            return Err(RebuildError::NotRedispatchable(task.kind));
        }
        let params = task
            .parameters
            .as_ref()
            .ok_or(RebuildError::MissingParameters(task.kind))?;
        if params.kind() != task.kind {
            return Err(RebuildError::KindMismatch {
                expected: task.kind,
                found: params.kind(),
            });
        }
        self.rebuild_params(params, owner)
    }
}
