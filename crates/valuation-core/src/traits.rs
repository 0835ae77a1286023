use crate::{FinancialHistory, ModelKind, ModelResult, SectorSignal, ValuationError};

/// Everything a single valuation model may look at.
#[derive(Debug, Clone, Copy)]
pub struct ModelContext<'a> {
    pub history: &'a FinancialHistory,
    pub signal: &'a SectorSignal,
}

/// A valuation model that can take part in a multi-model run.
///
/// Implementations must be pure: no I/O and no interior mutability, so the
/// orchestrator can evaluate them in parallel.
pub trait ValuationModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn evaluate(&self, ctx: &ModelContext<'_>) -> Result<ModelResult, ValuationError>;
}
