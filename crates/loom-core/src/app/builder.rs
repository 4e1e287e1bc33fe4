//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # 役割
//! - ports（store / notifier / clock / id 生成 / キャンセル判定）の差し込み
//! - kind ごとの rebuilder の登録
//! - 起動時検証（Fail-fast）: 期待した kind が全部登録されているか
//!
//! 登録表は `build()` の時点で凍結され、以降は `Arc` で共有するだけ。

use std::sync::Arc;

use super::dispatcher::TaskDispatcher;
use super::executor::TaskExecutor;
use super::launcher::{LaunchError, NewTask, TaskLauncher};
use super::status::TaskView;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{OwnerId, TaskId, TaskKind, TaskParams, TaskRecord};
use crate::impls::{InMemoryTaskStore, TracingNotifier};
use crate::ports::{
    CancellationCheck, Clock, IdGenerator, Notifier, StoreError, SystemClock, TaskStore,
    UlidGenerator,
};
use crate::typed::{
    FailureHook, KindParams, Rebuild, RebuildError, RebuildRegistry, RegistryError, TaskOperation,
};

/// EngineBuilder はエンジンを構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new(EngineConfig::from_env()?)
///     .store(Arc::new(my_store))
///     .register::<ProcessDocumentParams, _>(rebuild_document)?
///     .expect_all_redispatchable()
///     .build()?;
/// ```
///
/// port を指定しなければ in-memory store / tracing notifier / system clock を使う。
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn TaskStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    cancellation: Option<Arc<dyn CancellationCheck>>,
    registry: RebuildRegistry,
    expected_kinds: Option<Vec<TaskKind>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing rebuilders for task kinds: {0:?}. These kinds were expected but not registered.")]
    MissingKinds(Vec<TaskKind>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            notifier: None,
            clock: None,
            ids: None,
            cancellation: None,
            registry: RebuildRegistry::new(),
            expected_kinds: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn cancellation(mut self, check: Arc<dyn CancellationCheck>) -> Self {
        self.cancellation = Some(check);
        self
    }

    /// Rebuilder を登録
    pub fn register<P: KindParams, R: Rebuild<P> + 'static>(
        mut self,
        rebuilder: R,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<P, R>(rebuilder)?;
        Ok(self)
    }

    /// 期待される kind を設定（build() で検証）
    pub fn expect_kinds(mut self, kinds: &[TaskKind]) -> Self {
        self.expected_kinds = Some(kinds.to_vec());
        self
    }

    /// redispatch 対応の kind すべてに rebuilder を要求する
    pub fn expect_all_redispatchable(self) -> Self {
        let kinds: Vec<TaskKind> = TaskKind::ALL
            .iter()
            .copied()
            .filter(|k| k.supports_redispatch())
            .collect();
        self.expect_kinds(&kinds)
    }

    /// # 検証
    /// - config の値が妥当か
    /// - expect_kinds() で設定された kind が全て登録されているか
    pub fn build(self) -> Result<Engine, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_kinds {
            let registered = self.registry.registered_kinds();
            let missing: Vec<TaskKind> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingKinds(missing));
            }
        }

        let store: Arc<dyn TaskStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryTaskStore::new()),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(SystemClock)),
        };

        let mut executor = TaskExecutor::new(
            Arc::clone(&store),
            notifier,
            Arc::clone(&clock),
            self.config.clone(),
        );
        if let Some(check) = self.cancellation {
            executor = executor.with_cancellation(check);
        }

        let registry = Arc::new(self.registry);
        let launcher = Arc::new(TaskLauncher::new(
            Arc::new(executor),
            Arc::clone(&store),
            ids,
            clock,
        ));
        let dispatcher = TaskDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&launcher),
            Arc::clone(&store),
        );

        tracing::info!(kinds = ?registry.registered_kinds(), "engine ready");
        Ok(Engine {
            config: self.config,
            store,
            registry,
            launcher,
            dispatcher,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Engine はリクエスト処理側から見た表面
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    registry: Arc<RebuildRegistry>,
    launcher: Arc<TaskLauncher>,
    dispatcher: TaskDispatcher,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a task whose operation is built by the registered rebuilder.
    pub async fn submit(
        &self,
        owner: OwnerId,
        params: TaskParams,
        max_attempts: Option<u32>,
    ) -> Result<TaskId, SubmitError> {
        let rebuilt = self.registry.rebuild_params(&params, &owner)?;
        let mut request = NewTask::new(owner, params);
        request.max_attempts = max_attempts;
        Ok(self
            .launcher
            .launch(request, rebuilt.operation, rebuilt.on_failure)
            .await?)
    }

    /// Start a task with a caller-built operation, e.g. one holding an uploaded payload.
    pub async fn launch(
        &self,
        request: NewTask,
        operation: Arc<dyn TaskOperation>,
        on_failure: Option<Arc<dyn FailureHook>>,
    ) -> Result<TaskId, LaunchError> {
        self.launcher.launch(request, operation, on_failure).await
    }

    pub async fn redispatch(&self, task: TaskRecord, owner: &OwnerId) -> bool {
        self.dispatcher.redispatch(task, owner).await
    }

    pub async fn redispatch_by_id(&self, id: TaskId, owner: &OwnerId) -> bool {
        self.dispatcher.redispatch_by_id(id, owner).await
    }

    /// Entry point for a notification's retry action.
    pub async fn redispatch_url(&self, url: &str, owner: &OwnerId) -> bool {
        self.dispatcher.redispatch_url(&self.config, url, owner).await
    }

    pub async fn status(&self, id: TaskId) -> Result<Option<TaskView>, StoreError> {
        Ok(self.store.get(id).await?.as_ref().map(TaskView::from))
    }

    pub async fn wait_idle(&self) {
        self.launcher.wait_idle().await;
    }
}
