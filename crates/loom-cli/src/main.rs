use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use loom_core::app::{EngineBuilder, NewTask};
use loom_core::config::EngineConfig;
use loom_core::domain::{
    AnalyzeAssetParams, ConsolidatedInsightsParams, EnrichPlanItemParams,
    ExplainConclusionsParams, GenerateInsightsParams, OwnerId, ProcessDocumentParams, TaskError,
    TaskId, TaskOutput, TaskParams, TaskRecord,
};
use loom_core::impls::{ChannelNotifier, InMemoryTaskStore};
use loom_core::typed::{FailureHook, HookError, RebuildError, Rebuilt};

/// 上流 AI プロバイダの代役。最初の `outages` 回は 503 を返す。
struct FlakyUpstream {
    outages: AtomicU32,
}

impl FlakyUpstream {
    fn new(outages: u32) -> Arc<Self> {
        Arc::new(Self {
            outages: AtomicU32::new(outages),
        })
    }

    fn call(&self, what: &str) -> Result<(), TaskError> {
        let left = self.outages.load(Ordering::Relaxed);
        if left > 0 {
            self.outages.fetch_sub(1, Ordering::Relaxed);
            return Err(TaskError::from_upstream(format!(
                "503 Service Unavailable while {what} (outages left={left})"
            )));
        }
        Ok(())
    }
}

/// plan item の状態表。enrich が失敗したら item を failed にする。
#[derive(Default)]
struct PlanBoard {
    items: Mutex<HashMap<String, &'static str>>,
}

struct MarkPlanItemFailed {
    board: Arc<PlanBoard>,
    plan_item_id: String,
}

#[async_trait]
impl FailureHook for MarkPlanItemFailed {
    async fn on_failure(&self, task: &TaskRecord) -> Result<(), HookError> {
        self.board
            .items
            .lock()
            .await
            .insert(self.plan_item_id.clone(), "failed");
        tracing::info!(task_id = %task.id, plan_item_id = %self.plan_item_id, "plan item marked failed");
        Ok(())
    }
}

fn output(summary: String, url: String) -> Result<TaskOutput, TaskError> {
    Ok(TaskOutput::new(summary).with_url(url))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) ports と上流の代役を用意
    let config = EngineConfig::from_env().context("reading LOOM_* configuration")?;
    let store = InMemoryTaskStore::new();
    let (notifier, mut toasts) = ChannelNotifier::new();
    let upstream = FlakyUpstream::new(2);
    let board = Arc::new(PlanBoard::default());

    // (B) kind ごとの rebuilder を登録（保存済みパラメータだけで組み立てる）
    let documents = Arc::clone(&upstream);
    let insights = Arc::clone(&upstream);
    let hook_board = Arc::clone(&board);
    let engine = EngineBuilder::new(config)
        .store(Arc::new(store.clone()))
        .notifier(Arc::new(notifier))
        .register::<ProcessDocumentParams, _>(
            move |p: ProcessDocumentParams, _owner: &OwnerId| -> Result<Rebuilt, RebuildError> {
                let upstream = Arc::clone(&documents);
                Ok(Rebuilt::new(Arc::new(move || {
                    let upstream = Arc::clone(&upstream);
                    let id = p.document_id.clone();
                    async move {
                        upstream.call("extracting text")?;
                        output(format!("Processed {id}"), format!("/documents/{id}"))
                    }
                })))
            },
        )?
        .register::<GenerateInsightsParams, _>(
            move |p: GenerateInsightsParams, _owner: &OwnerId| -> Result<Rebuilt, RebuildError> {
                let upstream = Arc::clone(&insights);
                Ok(Rebuilt::new(Arc::new(move || {
                    let upstream = Arc::clone(&upstream);
                    let id = p.document_id.clone();
                    async move {
                        upstream.call("generating insights")?;
                        output(format!("Insights ready for {id}"), format!("/documents/{id}/insights"))
                    }
                })))
            },
        )?
        .register::<ConsolidatedInsightsParams, _>(
            |p: ConsolidatedInsightsParams, _owner: &OwnerId| -> Result<Rebuilt, RebuildError> {
                Ok(Rebuilt::new(Arc::new(move || {
                    let p = p.clone();
                    async move {
                        output(
                            format!("Consolidated {} documents", p.document_ids.len()),
                            format!("/portfolios/{}/insights", p.portfolio_id),
                        )
                    }
                })))
            },
        )?
        .register::<EnrichPlanItemParams, _>(
            move |p: EnrichPlanItemParams, _owner: &OwnerId| -> Result<Rebuilt, RebuildError> {
                let hook = MarkPlanItemFailed {
                    board: Arc::clone(&hook_board),
                    plan_item_id: p.plan_item_id.clone(),
                };
                Ok(Rebuilt::new(Arc::new(|| async {
                    Err::<TaskOutput, _>(TaskError::from_upstream("401 Unauthorized: invalid api key"))
                }))
                .with_failure_hook(Arc::new(hook)))
            },
        )?
        .register::<ExplainConclusionsParams, _>(
            |p: ExplainConclusionsParams, _owner: &OwnerId| -> Result<Rebuilt, RebuildError> {
                Ok(Rebuilt::new(Arc::new(move || {
                    let id = p.analysis_id.clone();
                    async move { output(format!("Explained {id}"), format!("/analyses/{id}")) }
                })))
            },
        )?
        .expect_all_redispatchable()
        .build()?;

    // (C) 通知はトーストとして表示
    let printer = tokio::spawn(async move {
        let mut retry_urls = Vec::new();
        while let Some(toast) = toasts.recv().await {
            println!("[{:?}] {}: {}", toast.kind, toast.title, toast.description);
            if let Some(action) = toast.action {
                println!("        -> {} ({})", action.label, action.url);
                if action.label == "Retry" {
                    retry_urls.push(action.url);
                }
            }
        }
        retry_urls
    });

    // (D) タスク投入。1 件目は上流が 2 回落ちるので予算 2 を使い切る
    let owner = OwnerId::new("demo-user");
    let doc = engine
        .submit(
            owner.clone(),
            TaskParams::ProcessDocument(ProcessDocumentParams {
                document_id: "doc-42".into(),
            }),
            None,
        )
        .await?;
    let plan_item = "item-7".to_string();
    board.items.lock().await.insert(plan_item.clone(), "pending");
    let enrich = engine
        .submit(
            owner.clone(),
            TaskParams::EnrichPlanItem(EnrichPlanItemParams {
                plan_id: "plan-1".into(),
                plan_item_id: plan_item.clone(),
            }),
            None,
        )
        .await?;
    let payload = b"\x89PNG fake image bytes".to_vec();
    let asset = engine
        .launch(
            NewTask::new(
                owner.clone(),
                TaskParams::AnalyzeAsset(AnalyzeAssetParams {
                    file_name: Some("chart.png".into()),
                }),
            ),
            Arc::new(move || {
                let size = payload.len();
                async move { output(format!("Analyzed {size} bytes"), "/assets/chart.png".into()) }
            }),
            None,
        )
        .await?;
    engine.wait_idle().await;
    report(&engine, &[doc, enrich, asset]).await?;

    // (E) ユーザーが retry を押した想定。同じ id で新しいパスが走る
    if !engine.redispatch_by_id(doc, &owner).await {
        anyhow::bail!("redispatch of {doc} was refused");
    }
    engine.wait_idle().await;
    report(&engine, &[doc]).await?;

    println!("plan items: {:?}", *board.items.lock().await);
    println!("counts: {:?}", store.counts_by_status().await);
    for task in store.list_by_owner(&owner).await {
        println!("{} {} {:?} attempts={}", task.id, task.kind, task.status, task.attempts_used);
    }

    drop(engine);
    let retry_urls = printer.await.context("toast printer panicked")?;
    println!("retry actions offered: {retry_urls:?}");
    Ok(())
}

async fn report(engine: &loom_core::app::Engine, ids: &[TaskId]) -> anyhow::Result<()> {
    for &id in ids {
        let view = engine
            .status(id)
            .await?
            .with_context(|| format!("task {id} not found"))?;
        println!("{}", serde_json::to_string(&view)?);
    }
    Ok(())
}
