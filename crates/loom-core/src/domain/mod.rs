//! Domain model (ids, kinds, parameters, records, errors, notifications).

pub mod errors;
pub mod ids;
pub mod notification;
pub mod outcome;
pub mod params;
pub mod state;
pub mod task;
pub mod task_kind;

pub use errors::{Classify, ErrorKind, TaskError, classify_upstream_message};
pub use ids::{Id, IdMarker, OwnerId, ParseIdError, TaskId};
pub use notification::{Notification, NotificationAction, NotificationKind};
pub use outcome::TaskOutput;
pub use params::{
    AnalyzeAssetParams, ConsolidatedInsightsParams, EnrichPlanItemParams,
    ExplainConclusionsParams, GenerateInsightsParams, ProcessDocumentParams, TaskParams,
};
pub use state::TaskStatus;
pub use task::{DEFAULT_MAX_ATTEMPTS, TaskRecord};
pub use task_kind::{TaskKind, UnknownTaskKind};
