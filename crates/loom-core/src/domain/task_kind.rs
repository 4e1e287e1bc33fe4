//! TaskKind - バックグラウンドタスクの種類
//!
//! 種類の集合は固定（追加は enum への variant 追加 + rebuilder 登録）。
//! ワイヤ上の名前は kebab-case（`process-document` など）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ProcessDocument,
    GenerateInsights,
    GenerateConsolidatedInsights,
    AnalyzeAsset,
    EnrichPlanItem,
    ExplainConclusions,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::ProcessDocument,
        TaskKind::GenerateInsights,
        TaskKind::GenerateConsolidatedInsights,
        TaskKind::AnalyzeAsset,
        TaskKind::EnrichPlanItem,
        TaskKind::ExplainConclusions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::ProcessDocument => "process-document",
            TaskKind::GenerateInsights => "generate-insights",
            TaskKind::GenerateConsolidatedInsights => "generate-consolidated-insights",
            TaskKind::AnalyzeAsset => "analyze-asset",
            TaskKind::EnrichPlanItem => "enrich-plan-item",
            TaskKind::ExplainConclusions => "explain-conclusions",
        }
    }

    /// Human-readable label used in notifications and status views.
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::ProcessDocument => "Document processing",
            TaskKind::GenerateInsights => "Insight generation",
            TaskKind::GenerateConsolidatedInsights => "Consolidated insights",
            TaskKind::AnalyzeAsset => "Asset analysis",
            TaskKind::EnrichPlanItem => "Plan item enrichment",
            TaskKind::ExplainConclusions => "Conclusion explanation",
        }
    }

    /// Whether a failed task of this kind can be rebuilt from its stored
    /// parameters alone.
    ///
    /// `AnalyzeAsset` works on an uploaded binary that is never persisted
    /// on the record.
    pub fn supports_redispatch(self) -> bool {
        !matches!(self, TaskKind::AnalyzeAsset)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind: {0}")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}
