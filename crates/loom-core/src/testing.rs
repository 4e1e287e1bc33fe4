//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{
    Notification, OwnerId, ProcessDocumentParams, TaskError, TaskId, TaskOutput, TaskParams,
    TaskRecord,
};
use crate::impls::InMemoryTaskStore;
use crate::ports::{Notifier, NotifyError, StoreError, TaskStore};
use crate::typed::{FailureHook, HookError, TaskOperation};

/// Shared event log so ordering between store writes and notifications can be asserted.
pub type Journal = Arc<StdMutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Store that journals every save before delegating to an in-memory store.
#[derive(Clone)]
pub struct JournalStore {
    pub inner: InMemoryTaskStore,
    journal: Journal,
    fail_saves: Arc<StdMutex<bool>>,
}

impl JournalStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: InMemoryTaskStore::new(),
            journal,
            fail_saves: Arc::new(StdMutex::new(false)),
        }
    }

    pub fn fail_saves(&self) {
        *self.fail_saves.lock().unwrap() = true;
    }
}

#[async_trait]
impl TaskStore for JournalStore {
    async fn save(&self, task: &TaskRecord) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.journal
            .lock()
            .unwrap()
            .push(format!("save:{:?}", task.status));
        self.inner.save(task).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.inner.get(id).await
    }
}

/// Notifier that records what it was asked to send, optionally failing.
#[derive(Clone)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    journal: Journal,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            journal,
            fail: false,
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.journal.lock().unwrap().push("notify".to_string());
        if self.fail {
            return Err(NotifyError::Delivery("push service down".into()));
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Operation that replays a script of results and counts its calls.
pub struct ScriptedOperation {
    script: StdMutex<VecDeque<Result<TaskOutput, TaskError>>>,
    pub calls: AtomicU32,
}

impl ScriptedOperation {
    pub fn new(script: Vec<Result<TaskOutput, TaskError>>) -> Arc<Self> {
        Arc::new(Self {
            script: StdMutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    /// Fails transiently on every call.
    pub fn always_transient() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskOperation for ScriptedOperation {
    async fn run(&self) -> Result<TaskOutput, TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TaskError::transient(format!("503 on call {call}"))))
    }
}

/// Failure hook that counts invocations and journals them.
pub struct CountingHook {
    pub calls: AtomicU32,
    journal: Journal,
    fail: bool,
}

impl CountingHook {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            journal,
            fail: false,
        })
    }

    pub fn failing(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            journal,
            fail: true,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FailureHook for CountingHook {
    async fn on_failure(&self, _task: &TaskRecord) -> Result<(), HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().push("hook".to_string());
        if self.fail {
            return Err(HookError("plan item store offline".into()));
        }
        Ok(())
    }
}

pub fn document_task() -> TaskRecord {
    TaskRecord::from_params(
        TaskId::from_ulid(Ulid::new()),
        OwnerId::new("user-1"),
        TaskParams::ProcessDocument(ProcessDocumentParams {
            document_id: "doc-1".into(),
        }),
        Utc::now(),
    )
}
