//! Typed task parameters.
//!
//! Each kind persists exactly what is needed to rebuild its operation
//! later. The union is tagged by `kind`, so a stored bag always says which
//! kind it belongs to.
//!
//! Fields default to empty on deserialization: a record written before a
//! key existed still loads, and the dispatcher reports the key as missing
//! instead of failing to read the record at all.

use serde::{Deserialize, Serialize};

use super::TaskKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskParams {
    ProcessDocument(ProcessDocumentParams),
    GenerateInsights(GenerateInsightsParams),
    GenerateConsolidatedInsights(ConsolidatedInsightsParams),
    AnalyzeAsset(AnalyzeAssetParams),
    EnrichPlanItem(EnrichPlanItemParams),
    ExplainConclusions(ExplainConclusionsParams),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDocumentParams {
    #[serde(default)]
    pub document_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateInsightsParams {
    #[serde(default)]
    pub document_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedInsightsParams {
    #[serde(default)]
    pub portfolio_id: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

/// The uploaded file itself is never persisted; only its name is kept for
/// display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeAssetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichPlanItemParams {
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub plan_item_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainConclusionsParams {
    #[serde(default)]
    pub analysis_id: String,
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl TaskParams {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskParams::ProcessDocument(_) => TaskKind::ProcessDocument,
            TaskParams::GenerateInsights(_) => TaskKind::GenerateInsights,
            TaskParams::GenerateConsolidatedInsights(_) => TaskKind::GenerateConsolidatedInsights,
            TaskParams::AnalyzeAsset(_) => TaskKind::AnalyzeAsset,
            TaskParams::EnrichPlanItem(_) => TaskKind::EnrichPlanItem,
            TaskParams::ExplainConclusions(_) => TaskKind::ExplainConclusions,
        }
    }

    /// First required key that is absent or blank, if any.
    pub fn missing_key(&self) -> Option<&'static str> {
        match self {
            TaskParams::ProcessDocument(p) => blank(&p.document_id).then_some("document_id"),
            TaskParams::GenerateInsights(p) => blank(&p.document_id).then_some("document_id"),
            TaskParams::GenerateConsolidatedInsights(p) => {
                if blank(&p.portfolio_id) {
                    Some("portfolio_id")
                } else if p.document_ids.is_empty() || p.document_ids.iter().any(|d| blank(d)) {
                    Some("document_ids")
                } else {
                    None
                }
            }
            TaskParams::AnalyzeAsset(_) => None,
            TaskParams::EnrichPlanItem(p) => {
                if blank(&p.plan_id) {
                    Some("plan_id")
                } else if blank(&p.plan_item_id) {
                    Some("plan_item_id")
                } else {
                    None
                }
            }
            TaskParams::ExplainConclusions(p) => blank(&p.analysis_id).then_some("analysis_id"),
        }
    }
}
