use model_selector::ModelRecommendation;
use serde::{Deserialize, Serialize};
use valuation_core::{
    Assumptions, ConsensusSummary, FinancialHistory, ModelKind, SectorSignal, SensitivityGrid,
    Valuation,
};
use valuation_orchestrator::{Segment, SotpValuation};

/// One valuation job read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ValuationRequest {
    pub history: FinancialHistory,
    /// Derived from history when absent
    #[serde(default)]
    pub assumptions: Option<Assumptions>,
    /// Enables model selection and the multi-model consensus
    #[serde(default)]
    pub signal: Option<SectorSignal>,
    #[serde(default)]
    pub model_preference: Option<ModelKind>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValuationReport {
    pub ticker: String,
    pub valuation: Valuation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityGrid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_recommendation: Option<ModelRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sotp: Option<SotpValuation>,
}

impl ValuationRequest {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let request: ValuationRequest = serde_json::from_str(raw)?;
        if request.history.ticker.trim().is_empty() {
            anyhow::bail!("history.ticker is required");
        }
        Ok(request)
    }
}
