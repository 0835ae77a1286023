//! Multi-Model Valuation
//!
//! Runs every registered [`ValuationModel`] over the same inputs, drops the
//! ones that fail and aggregates the rest into a [`ConsensusSummary`].

pub mod consensus;
pub mod models;
pub mod sotp;


use model_selector::ModelSelector;
use rayon::prelude::*;
use valuation_core::{
    ConsensusSummary, FinancialHistory, ModelContext, ModelKind, ModelResult, SectorSignal,
    ValuationConfig, ValuationError, ValuationModel, ValuationWarning, WarningSink,
};

pub use consensus::{build_consensus, recommend, Dispersion};
pub use models::{default_models, AssetModel, DcfModel, DdmModel};
pub use sotp::{compute_sotp, Segment, SegmentValue, SotpValuation};

const PRIMARY_CONFIDENCE_BOOST: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

pub struct MultiModelOrchestrator {
    models: Vec<Box<dyn ValuationModel>>,
    selector: ModelSelector,
    config: ValuationConfig,
}

impl Default for MultiModelOrchestrator {
    fn default() -> Self {
        Self::new(ValuationConfig::default(), ModelSelector::default())
    }
}

impl MultiModelOrchestrator {
    /// Orchestrator with the standard DCF, DDM and asset models.
    pub fn new(config: ValuationConfig, selector: ModelSelector) -> Self {
        Self {
            models: default_models(&config),
            selector,
            config,
        }
    }

    /// Orchestrator over a caller-supplied model set.
    pub fn with_models(
        models: Vec<Box<dyn ValuationModel>>,
        selector: ModelSelector,
        config: ValuationConfig,
    ) -> Self {
        Self { models, selector, config }
    }

    pub fn model_kinds(&self) -> Vec<ModelKind> {
        self.models.iter().map(|m| m.kind()).collect()
    }

    /// Preference wins; otherwise the selector's recommendation.
    fn primary_model(&self, signal: &SectorSignal, preference: Option<ModelKind>) -> ModelKind {
        preference.unwrap_or_else(|| {
            let rec = self.selector.recommend_model(signal);
            tracing::debug!(model = %rec.model, confidence = rec.confidence, "{}", rec.rationale);
            rec.model
        })
    }

    pub fn compute_multi_model_valuation(
        &self,
        history: &FinancialHistory,
        signal: &SectorSignal,
        preference: Option<ModelKind>,
    ) -> Result<ConsensusSummary, ValuationError> {
        tracing::info!(
            "Starting multi-model valuation for {} ({} models)",
            history.ticker,
            self.models.len()
        );

        let primary = self.primary_model(signal, preference);
        let ctx = ModelContext { history, signal };

        let outcomes: Vec<(ModelKind, Result<ModelResult, ValuationError>)> = self
            .models
            .par_iter()
            .map(|model| (model.kind(), model.evaluate(&ctx)))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        let mut warnings = WarningSink::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(result) if result.fair_value.is_finite() => results.push(result),
                Ok(result) => warnings.push(ValuationWarning::model_unavailable(
                    kind,
                    format!("non-finite fair value {}", result.fair_value),
                )),
                Err(e) => warnings.push(ValuationWarning::model_unavailable(kind, e.to_string())),
            }
        }

        for result in results.iter_mut().filter(|r| r.model_kind == primary) {
            result.confidence = (result.confidence + PRIMARY_CONFIDENCE_BOOST).min(MAX_CONFIDENCE);
        }

        if results.is_empty() {
            tracing::warn!("All valuation models failed for {}", history.ticker);
        } else {
            tracing::info!(
                "{} of {} models succeeded for {} (primary: {})",
                results.len(),
                self.models.len(),
                history.ticker,
                primary
            );
        }

        build_consensus(
            &history.ticker,
            primary,
            results,
            warnings.into_vec(),
            signal.price(),
            &self.config.recommendation,
        )
    }

    /// Return a cached summary untouched if one is supplied; expiry is the
    /// caller's concern.
    pub fn consensus_or_cached(
        &self,
        cached: Option<ConsensusSummary>,
        history: &FinancialHistory,
        signal: &SectorSignal,
        preference: Option<ModelKind>,
    ) -> Result<ConsensusSummary, ValuationError> {
        match cached {
            Some(summary) => {
                tracing::debug!("Using cached consensus for {}", summary.ticker);
                Ok(summary)
            }
            None => self.compute_multi_model_valuation(history, signal, preference),
        }
    }
}
