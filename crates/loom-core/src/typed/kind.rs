//! KindParams trait - パラメータ型と TaskKind の対応付け
//!
//! `TaskParams` の各 variant が持つ struct に、対応する kind を
//! Associated Constant で結びつける。

use crate::domain::{
    AnalyzeAssetParams, ConsolidatedInsightsParams, EnrichPlanItemParams,
    ExplainConclusionsParams, GenerateInsightsParams, ProcessDocumentParams, TaskKind, TaskParams,
};

/// # Trait Bounds
/// - `Clone`: rebuild に所有権付きで渡すため
/// - `Send + Sync + 'static`: Arc に格納された rebuilder から使うため
pub trait KindParams: Clone + Send + Sync + 'static {
    const KIND: TaskKind;

    /// Borrow the typed struct if `params` is this kind's variant.
    fn from_params(params: &TaskParams) -> Option<&Self>;

    fn into_params(self) -> TaskParams;
}

macro_rules! kind_params {
    ($ty:ty, $variant:ident) => {
        impl KindParams for $ty {
            const KIND: TaskKind = TaskKind::$variant;

            fn from_params(params: &TaskParams) -> Option<&Self> {
                match params {
                    TaskParams::$variant(p) => Some(p),
                    _ => None,
                }
            }

            fn into_params(self) -> TaskParams {
                TaskParams::$variant(self)
            }
        }
    };
}

kind_params!(ProcessDocumentParams, ProcessDocument);
kind_params!(GenerateInsightsParams, GenerateInsights);
kind_params!(ConsolidatedInsightsParams, GenerateConsolidatedInsights);
kind_params!(AnalyzeAssetParams, AnalyzeAsset);
kind_params!(EnrichPlanItemParams, EnrichPlanItem);
kind_params!(ExplainConclusionsParams, ExplainConclusions);
