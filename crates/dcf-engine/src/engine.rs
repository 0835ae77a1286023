use valuation_core::{
    Assumptions, FinancialHistory, GrowthMode, SensitivityGrid, Valuation, ValuationConfig,
    ValuationError, WarningSink,
};

use crate::assumptions::{default_assumptions, historical_growth_estimates, normalize};
use crate::growth_stages::{GrowthInputs, GrowthStageScheduler};
use crate::projector::CashFlowProjector;
use crate::sensitivity::SensitivityEngine;
use crate::terminal::{TerminalValueCalculator, ValuationAggregator};

/// Multi-stage discounted cash flow engine.
///
/// Stateless apart from its immutable config; every method is safe to call
/// from any number of threads at once.
#[derive(Debug, Clone, Default)]
pub struct DcfEngine {
    config: ValuationConfig,
}

impl DcfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn compute_default_assumptions(&self, history: &FinancialHistory) -> Assumptions {
        default_assumptions(history, &self.config)
    }

    /// Scheduler inputs for a normalized set of assumptions. The fade target
    /// is the terminal growth rate so the last stage meets the perpetuity.
    pub fn growth_inputs(&self, history: &FinancialHistory, assumptions: &Assumptions) -> GrowthInputs {
        let mut historical_rates = vec![assumptions.revenue_growth_rate];
        if assumptions.growth_mode == GrowthMode::Enhanced {
            historical_rates.extend(historical_growth_estimates(history));
        }
        GrowthInputs {
            historical_rates,
            data_points: history.revenue_data_points(),
            target_rate: assumptions.terminal_growth_rate,
            mode: assumptions.growth_mode,
            horizon: assumptions.projection_years,
        }
    }

    fn validate_history(&self, history: &FinancialHistory) -> Result<(), ValuationError> {
        if history.is_empty() {
            return Err(ValuationError::EmptyHistory(history.ticker.clone()));
        }
        if !history.is_most_recent_first() {
            return Err(ValuationError::InvalidInput(format!(
                "{}: years must be ordered most recent first",
                history.ticker
            )));
        }
        if history.latest_shares().is_none() {
            return Err(ValuationError::NoSharesOutstanding(history.ticker.clone()));
        }
        Ok(())
    }

    /// Full DCF point valuation.
    ///
    /// Pure function of its inputs: identical inputs give bit-identical output.
    pub fn compute_valuation(
        &self,
        history: &FinancialHistory,
        assumptions: &Assumptions,
    ) -> Result<Valuation, ValuationError> {
        self.validate_history(history)?;

        let mut warnings = WarningSink::new();
        let (normalized, normalize_warnings) = normalize(assumptions, &self.config)?;
        warnings.extend(normalize_warnings);

        let schedule = GrowthStageScheduler::new(&self.config)
            .schedule(&self.growth_inputs(history, &normalized))?;
        warnings.extend(schedule.warnings.iter().cloned());

        let run = CashFlowProjector::new(&self.config.projection).project(
            history,
            &schedule.stages,
            &normalized,
        );
        warnings.extend(run.warnings.iter().cloned());

        let last_fcf = run.last_free_cash_flow().unwrap_or(0.0);
        let terminal = TerminalValueCalculator::calculate(
            last_fcf,
            normalized.wacc,
            normalized.terminal_growth_rate,
            normalized.projection_years,
        )?;

        tracing::debug!(
            ticker = %history.ticker,
            wacc = normalized.wacc,
            terminal_growth = normalized.terminal_growth_rate,
            stages = schedule.stages.len(),
            "Computed DCF projections"
        );

        ValuationAggregator::new(&self.config).aggregate(
            history,
            normalized,
            schedule,
            run,
            terminal,
            warnings,
        )
    }

    pub fn compute_sensitivity(
        &self,
        history: &FinancialHistory,
        assumptions: &Assumptions,
    ) -> Result<SensitivityGrid, ValuationError> {
        SensitivityEngine::new(self).compute(history, assumptions)
    }
}
