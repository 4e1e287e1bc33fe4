//! TaskDispatcher - failed なタスクをユーザー操作で再実行する
//!
//! 保存済み `parameters` だけから operation を組み直し、同じ id で
//! launcher に新しいパスを開始させる。組み直せない場合は warn を出して
//! `false` を返す（panic もエラー伝播もしない）。
//!
//! dispatcher 自身はリトライしない。1 回の redispatch で買えるのは
//! 新しい attempt 予算 1 サイクル分だけ。

use std::sync::Arc;

use super::launcher::TaskLauncher;
use crate::config::EngineConfig;
use crate::domain::{OwnerId, TaskId, TaskRecord, TaskStatus};
use crate::ports::TaskStore;
use crate::typed::RebuildRegistry;

pub struct TaskDispatcher {
    registry: Arc<RebuildRegistry>,
    launcher: Arc<TaskLauncher>,
    store: Arc<dyn TaskStore>,
}

impl TaskDispatcher {
    pub fn new(
        registry: Arc<RebuildRegistry>,
        launcher: Arc<TaskLauncher>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            registry,
            launcher,
            store,
        }
    }

    /// Start a new execution pass for a failed task. `true` means a pass was
    /// started; its outcome arrives later as a notification.
    pub async fn redispatch(&self, task: TaskRecord, owner: &OwnerId) -> bool {
        if task.status != TaskStatus::Failed {
            tracing::warn!(task_id = %task.id, status = ?task.status, "redispatch refused: task has not failed");
            return false;
        }

        let rebuilt = match self.registry.rebuild_record(&task, owner) {
            Ok(rebuilt) => rebuilt,
            Err(err) => {
                tracing::warn!(task_id = %task.id, kind = %task.kind, error = %err, "redispatch refused");
                return false;
            }
        };

        let task_id = task.id;
        match self
            .launcher
            .relaunch(task, rebuilt.operation, rebuilt.on_failure)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(task_id = %task_id, error = %err, "redispatch could not reset the task record");
                false
            }
        }
    }

    /// Look the task up first. Unknown ids and tasks owned by someone else are refused.
    pub async fn redispatch_by_id(&self, id: TaskId, owner: &OwnerId) -> bool {
        let task = match self.store.get(id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::warn!(task_id = %id, "redispatch refused: unknown task");
                return false;
            }
            Err(err) => {
                tracing::error!(task_id = %id, error = %err, "redispatch refused: store unavailable");
                return false;
            }
        };
        if &task.owner_id != owner {
            tracing::warn!(task_id = %id, "redispatch refused: task belongs to another owner");
            return false;
        }
        self.redispatch(task, owner).await
    }

    /// Handle a click on a notification's retry action.
    pub async fn redispatch_url(&self, config: &EngineConfig, url: &str, owner: &OwnerId) -> bool {
        match config.parse_retry_url(url) {
            Some(id) => self.redispatch_by_id(id, owner).await,
            None => {
                tracing::warn!(url, "redispatch refused: not a retry route");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::executor::TaskExecutor;
    use crate::domain::{
        AnalyzeAssetParams, ConsolidatedInsightsParams, EnrichPlanItemParams,
        ExplainConclusionsParams, NotificationKind, ProcessDocumentParams, TaskError, TaskKind,
        TaskOutput, TaskParams,
    };
    use crate::ports::{SystemClock, UlidGenerator};
    use crate::testing::{
        CountingHook, JournalStore, RecordingNotifier, ScriptedOperation, document_task, journal,
    };
    use crate::typed::{RebuildError, Rebuilt};
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        store: JournalStore,
        notifier: RecordingNotifier,
        launcher: Arc<TaskLauncher>,
        rebuilds: Arc<AtomicU32>,
        op: Arc<ScriptedOperation>,
        hook: Arc<CountingHook>,
    }

    impl Harness {
        fn new(op: Arc<ScriptedOperation>) -> Self {
            let j = journal();
            let store = JournalStore::new(j.clone());
            let notifier = RecordingNotifier::new(j.clone());
            let shared: Arc<dyn TaskStore> = Arc::new(store.clone());
            let executor = Arc::new(TaskExecutor::new(
                Arc::clone(&shared),
                Arc::new(notifier.clone()),
                Arc::new(SystemClock),
                EngineConfig::default(),
            ));
            let launcher = Arc::new(TaskLauncher::new(
                executor,
                shared,
                Arc::new(UlidGenerator::new(SystemClock)),
                Arc::new(SystemClock),
            ));
            Self {
                store,
                notifier,
                launcher,
                rebuilds: Arc::new(AtomicU32::new(0)),
                op,
                hook: CountingHook::new(j),
            }
        }

        fn dispatcher(&self) -> TaskDispatcher {
            let mut registry = RebuildRegistry::new();

            let (rebuilds, op) = (Arc::clone(&self.rebuilds), Arc::clone(&self.op));
            registry
                .register::<ProcessDocumentParams, _>(
                    move |_p: ProcessDocumentParams, _o: &OwnerId| -> Result<Rebuilt, RebuildError> {
                        rebuilds.fetch_add(1, Ordering::SeqCst);
                        Ok(Rebuilt::new(op.clone()))
                    },
                )
                .unwrap();

            let (rebuilds, op, hook) = (
                Arc::clone(&self.rebuilds),
                Arc::clone(&self.op),
                Arc::clone(&self.hook),
            );
            registry
                .register::<EnrichPlanItemParams, _>(
                    move |_p: EnrichPlanItemParams, _o: &OwnerId| -> Result<Rebuilt, RebuildError> {
                        rebuilds.fetch_add(1, Ordering::SeqCst);
                        Ok(Rebuilt::new(op.clone()).with_failure_hook(hook.clone()))
                    },
                )
                .unwrap();

            let (rebuilds, op) = (Arc::clone(&self.rebuilds), Arc::clone(&self.op));
            registry
                .register::<ConsolidatedInsightsParams, _>(
                    move |_p: ConsolidatedInsightsParams, _o: &OwnerId| -> Result<Rebuilt, RebuildError> {
                        rebuilds.fetch_add(1, Ordering::SeqCst);
                        Ok(Rebuilt::new(op.clone()))
                    },
                )
                .unwrap();

            TaskDispatcher::new(
                Arc::new(registry),
                Arc::clone(&self.launcher),
                Arc::new(self.store.clone()),
            )
        }

        async fn seed_failed(&self, mut task: TaskRecord) -> TaskRecord {
            task.mark_failed("upstream 503".into(), true, 2, Utc::now());
            self.store.save(&task).await.unwrap();
            task
        }
    }

    fn failed_record(kind: TaskKind, parameters: Option<TaskParams>) -> TaskRecord {
        let mut task = document_task();
        task.kind = kind;
        task.parameters = parameters;
        task
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_restarts_under_same_id_with_fresh_budget() {
        let h = Harness::new(ScriptedOperation::new(vec![Ok(TaskOutput::new("done"))]));
        let dispatcher = h.dispatcher();
        let task = h.seed_failed(document_task()).await;
        let owner = task.owner_id.clone();
        let id = task.id;

        assert!(dispatcher.redispatch(task, &owner).await);
        h.launcher.wait_idle().await;

        let saved = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(saved.status, TaskStatus::Completed);
        assert_eq!(saved.attempts_used, 0);
        assert_eq!(saved.error_message, None);
        assert_eq!(saved.error_recoverable, None);
        assert_eq!(h.op.calls(), 1);
        assert_eq!(h.store.inner.counts_by_status().await.completed, 1);
        assert_eq!(h.notifier.sent().await[0].kind, NotificationKind::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn redispatched_pass_uses_whole_attempt_budget_again() {
        let h = Harness::new(ScriptedOperation::always_transient());
        let dispatcher = h.dispatcher();
        let task = h.seed_failed(document_task()).await;
        let owner = task.owner_id.clone();

        assert!(dispatcher.redispatch(task, &owner).await);
        h.launcher.wait_idle().await;

        // default budget of 2, none carried over from the earlier pass
        assert_eq!(h.op.calls(), 2);
        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].action.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn compensating_hook_follows_the_task() {
        let h = Harness::new(ScriptedOperation::new(vec![Err(TaskError::permanent(
            "plan item deleted",
        ))]));
        let dispatcher = h.dispatcher();
        let params = TaskParams::EnrichPlanItem(EnrichPlanItemParams {
            plan_id: "plan-1".into(),
            plan_item_id: "item-3".into(),
        });
        let task = h
            .seed_failed(failed_record(TaskKind::EnrichPlanItem, Some(params)))
            .await;
        let owner = task.owner_id.clone();

        assert!(dispatcher.redispatch(task, &owner).await);
        h.launcher.wait_idle().await;

        assert_eq!(h.hook.calls(), 1);
    }

    #[rstest]
    #[case::no_parameters(TaskKind::ProcessDocument, None)]
    #[case::blank_document_id(
        TaskKind::ProcessDocument,
        Some(TaskParams::ProcessDocument(ProcessDocumentParams { document_id: "  ".into() }))
    )]
    #[case::missing_plan_item(
        TaskKind::EnrichPlanItem,
        Some(TaskParams::EnrichPlanItem(EnrichPlanItemParams {
            plan_id: "plan-1".into(),
            plan_item_id: String::new(),
        }))
    )]
    #[case::empty_document_list(
        TaskKind::GenerateConsolidatedInsights,
        Some(TaskParams::GenerateConsolidatedInsights(ConsolidatedInsightsParams {
            portfolio_id: "pf-1".into(),
            document_ids: vec![],
        }))
    )]
    #[case::parameters_of_other_kind(
        TaskKind::EnrichPlanItem,
        Some(TaskParams::ProcessDocument(ProcessDocumentParams { document_id: "doc".into() }))
    )]
    #[case::no_rebuilder(
        TaskKind::ExplainConclusions,
        Some(TaskParams::ExplainConclusions(ExplainConclusionsParams { analysis_id: "an-1".into() }))
    )]
    #[tokio::test]
    async fn missing_parameters_refuse_without_executing(
        #[case] kind: TaskKind,
        #[case] parameters: Option<TaskParams>,
    ) {
        let h = Harness::new(ScriptedOperation::always_transient());
        let dispatcher = h.dispatcher();
        let task = h.seed_failed(failed_record(kind, parameters)).await;
        let owner = task.owner_id.clone();
        let id = task.id;

        assert!(!dispatcher.redispatch(task, &owner).await);
        h.launcher.wait_idle().await;

        assert_eq!(h.rebuilds.load(Ordering::SeqCst), 0);
        assert_eq!(h.op.calls(), 0);
        assert!(h.notifier.sent().await.is_empty());
        let saved = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(saved.status, TaskStatus::Failed);
    }

    #[rstest]
    #[case::without_parameters(None)]
    #[case::with_file_name(Some(TaskParams::AnalyzeAsset(AnalyzeAssetParams {
        file_name: Some("scan.pdf".into()),
    })))]
    #[tokio::test]
    async fn binary_input_kinds_are_always_refused(#[case] parameters: Option<TaskParams>) {
        let h = Harness::new(ScriptedOperation::always_transient());
        let dispatcher = h.dispatcher();
        let task = h
            .seed_failed(failed_record(TaskKind::AnalyzeAsset, parameters))
            .await;
        let owner = task.owner_id.clone();

        assert!(!dispatcher.redispatch(task, &owner).await);
        assert_eq!(h.op.calls(), 0);
    }

    #[rstest]
    #[case::running(TaskStatus::Running)]
    #[case::completed(TaskStatus::Completed)]
    #[tokio::test]
    async fn only_failed_tasks_are_redispatched(#[case] status: TaskStatus) {
        let h = Harness::new(ScriptedOperation::always_transient());
        let dispatcher = h.dispatcher();
        let mut task = document_task();
        task.status = status;
        let owner = task.owner_id.clone();

        assert!(!dispatcher.redispatch(task, &owner).await);
        assert_eq!(h.rebuilds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_url_resolves_to_the_owners_task() {
        let h = Harness::new(ScriptedOperation::new(vec![Ok(TaskOutput::new("done"))]));
        let dispatcher = h.dispatcher();
        let config = EngineConfig::default();
        let task = h.seed_failed(document_task()).await;
        let url = config.retry_url(task.id);

        assert!(!dispatcher.redispatch_url(&config, &url, &OwnerId::new("mallory")).await);
        assert!(!dispatcher.redispatch_url(&config, "/tasks/nope/retry", &task.owner_id).await);
        assert!(dispatcher.redispatch_url(&config, &url, &task.owner_id).await);
        h.launcher.wait_idle().await;

        assert_eq!(h.op.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_task_id_is_refused() {
        let h = Harness::new(ScriptedOperation::always_transient());
        let dispatcher = h.dispatcher();
        let task = document_task();

        assert!(!dispatcher.redispatch_by_id(task.id, &task.owner_id).await);
    }
}
