use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ModelKind;

/// Structural faults with no recoverable fallback.
///
/// Everything recoverable is reported as a [`ValuationWarning`] on the
/// returned value instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("No positive shares outstanding in history for {0}")]
    NoSharesOutstanding(String),

    #[error("Empty financial history for {0}")]
    EmptyHistory(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid stage template: {0}")]
    InvalidTemplate(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("No valuation model succeeded (failed: {})", .0.join(", "))]
    NoModelsSucceeded(Vec<String>),
}

/// Non-fatal condition accumulated on a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValuationWarning {
    /// Missing or short history; a conservative fallback was used.
    DataInsufficient { detail: String },
    /// Discount rate too close to (or below) the growth rate; rate was clamped.
    DegenerateAssumptions { detail: String },
    /// Share count looked like it was reported in a different unit; rescaled once.
    UnitMismatchSuspected { detail: String },
    /// One model of a multi-model run failed and was excluded.
    ModelUnavailable { model: ModelKind, reason: String },
}

impl ValuationWarning {
    pub fn data_insufficient(detail: impl Into<String>) -> Self {
        ValuationWarning::DataInsufficient { detail: detail.into() }
    }

    pub fn degenerate(detail: impl Into<String>) -> Self {
        ValuationWarning::DegenerateAssumptions { detail: detail.into() }
    }

    pub fn unit_mismatch(detail: impl Into<String>) -> Self {
        ValuationWarning::UnitMismatchSuspected { detail: detail.into() }
    }

    pub fn model_unavailable(model: ModelKind, reason: impl Into<String>) -> Self {
        ValuationWarning::ModelUnavailable { model, reason: reason.into() }
    }

    /// Short machine-friendly tag for logs and de-duplication.
    pub fn tag(&self) -> &'static str {
        match self {
            ValuationWarning::DataInsufficient { .. } => "data_insufficient",
            ValuationWarning::DegenerateAssumptions { .. } => "degenerate_assumptions",
            ValuationWarning::UnitMismatchSuspected { .. } => "unit_mismatch_suspected",
            ValuationWarning::ModelUnavailable { .. } => "model_unavailable",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ValuationWarning::DataInsufficient { detail }
            | ValuationWarning::DegenerateAssumptions { detail }
            | ValuationWarning::UnitMismatchSuspected { detail } => detail.clone(),
            ValuationWarning::ModelUnavailable { model, reason } => {
                format!("{} model unavailable: {}", model.as_str(), reason)
            }
        }
    }
}

impl std::fmt::Display for ValuationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.tag(), self.message())
    }
}

/// Collects warnings and mirrors each one to the log as it is recorded.
#[derive(Debug, Default, Clone)]
pub struct WarningSink {
    warnings: Vec<ValuationWarning>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ValuationWarning) {
        tracing::warn!(kind = warning.tag(), "{}", warning.message());
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = ValuationWarning>) {
        for w in warnings {
            self.push(w);
        }
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValuationWarning> {
        self.warnings
    }
}
