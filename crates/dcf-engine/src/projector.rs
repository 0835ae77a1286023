//! Cash Flow Projection
//!
//! Turns a growth schedule plus margin and tax assumptions into yearly free
//! cash flows and their present values.

use serde::{Deserialize, Serialize};
use valuation_core::{
    Assumptions, FinancialHistory, GrowthStage, Projection, ProjectionConfig, ValuationWarning,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRun {
    pub base_revenue: f64,
    pub projections: Vec<Projection>,
    pub warnings: Vec<ValuationWarning>,
}

impl ProjectionRun {
    pub fn sum_present_value(&self) -> f64 {
        self.projections.iter().map(|p| p.present_value).sum()
    }

    pub fn last_free_cash_flow(&self) -> Option<f64> {
        self.projections.last().map(|p| p.free_cash_flow)
    }
}

pub struct CashFlowProjector<'a> {
    config: &'a ProjectionConfig,
}

impl<'a> CashFlowProjector<'a> {
    pub fn new(config: &'a ProjectionConfig) -> Self {
        Self { config }
    }

    /// Base revenue for the projection: the most recent non-zero revenue.
    fn base_revenue(history: &FinancialHistory, warnings: &mut Vec<ValuationWarning>) -> f64 {
        match history.latest_nonzero_revenue() {
            Some((0, revenue)) => revenue,
            Some((idx, revenue)) => {
                let year = history
                    .years
                    .get(idx)
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| format!("index {}", idx));
                warnings.push(ValuationWarning::data_insufficient(format!(
                    "Most recent revenue is zero; projecting from {} revenue {:.2}",
                    year, revenue
                )));
                revenue
            }
            None => {
                warnings.push(ValuationWarning::data_insufficient(
                    "No non-zero revenue in history; projecting zero cash flows",
                ));
                0.0
            }
        }
    }

    /// Project one entry per year in `[1, assumptions.projection_years]`.
    ///
    /// `stages` must tile the horizon; `assumptions` are expected to be
    /// normalized (percent rates, positive horizon).
    pub fn project(
        &self,
        history: &FinancialHistory,
        stages: &[GrowthStage],
        assumptions: &Assumptions,
    ) -> ProjectionRun {
        let mut warnings = Vec::new();
        let base_revenue = Self::base_revenue(history, &mut warnings);

        let margin = assumptions.ebitda_margin / 100.0;
        let tax_rate = assumptions.tax_rate / 100.0;
        let wacc = assumptions.wacc / 100.0;

        let mut projections = Vec::with_capacity(assumptions.projection_years as usize);
        let mut prior_revenue = base_revenue;
        let mut overflowed = false;

        for year in 1..=assumptions.projection_years {
            let stage = match stages.iter().find(|s| s.contains(year)).or(stages.last()) {
                Some(s) => s,
                None => break,
            };
            let growth = stage.growth_rate / 100.0;

            let revenue = prior_revenue * (1.0 + growth);
            let ebitda = revenue * margin;
            let depreciation = revenue * self.config.depreciation_fraction;
            let ebit = ebitda - depreciation;
            // No tax credit for operating losses
            let tax = ebit.max(0.0) * tax_rate;
            let nopat = ebit - tax;
            let capex = revenue * self.config.capex_fraction;
            let working_capital_change =
                (revenue - prior_revenue) * self.config.working_capital_fraction;
            let free_cash_flow = nopat + depreciation - capex - working_capital_change;

            let discount_factor = (1.0 + wacc).powi(year as i32);
            let present_value =
                if discount_factor.is_finite() && discount_factor > 0.0 && free_cash_flow.is_finite() {
                    free_cash_flow / discount_factor
                } else {
                    overflowed = true;
                    0.0
                };

            projections.push(Projection {
                year,
                growth_rate: stage.growth_rate,
                revenue,
                ebitda,
                depreciation,
                ebit,
                tax,
                nopat,
                capex,
                working_capital_change,
                free_cash_flow,
                discount_factor,
                present_value,
                stage: stage.label(),
                method: stage.method,
            });
            prior_revenue = revenue;
        }

        if overflowed {
            warnings.push(ValuationWarning::data_insufficient(
                "Projection overflowed floating point range; affected years contribute zero present value",
            ));
        }

        ProjectionRun {
            base_revenue,
            projections,
            warnings,
        }
    }
}
