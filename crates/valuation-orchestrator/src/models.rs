//! Valuation Model Calculators
//!
//! DCF, dividend discount and asset-based models behind the common
//! [`ValuationModel`] trait.

use dcf_engine::{clamp_discount_rate, DcfEngine};
use serde_json::json;
use valuation_core::stats;
use valuation_core::{
    ModelConfig, ModelContext, ModelKind, ModelResult, ValuationConfig, ValuationError,
    ValuationModel, ValuationWarning,
};

const DCF_BASE_CONFIDENCE: f64 = 0.75;
const DCF_WARNING_PENALTY: f64 = 0.1;
const DCF_MIN_CONFIDENCE: f64 = 0.3;

/// Multi-stage DCF on assumptions derived from the history.
pub struct DcfModel {
    engine: DcfEngine,
}

impl DcfModel {
    pub fn new(engine: DcfEngine) -> Self {
        Self { engine }
    }
}

impl ValuationModel for DcfModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Dcf
    }

    fn evaluate(&self, ctx: &ModelContext<'_>) -> Result<ModelResult, ValuationError> {
        let assumptions = self.engine.compute_default_assumptions(ctx.history);
        let valuation = self.engine.compute_valuation(ctx.history, &assumptions)?;

        let penalty = DCF_WARNING_PENALTY * valuation.warnings.len() as f64;
        let confidence = (DCF_BASE_CONFIDENCE - penalty).max(DCF_MIN_CONFIDENCE);

        let mut reasoning = vec![format!(
            "{} stage(s) over {} years, wacc {:.2}%, terminal growth {:.2}%",
            valuation.stages.len(),
            valuation.assumptions.projection_years,
            valuation.assumptions.wacc,
            valuation.assumptions.terminal_growth_rate
        )];
        if valuation.enterprise_value > 0.0 {
            reasoning.push(format!(
                "Terminal value is {:.0}% of enterprise value",
                valuation.pv_terminal_value / valuation.enterprise_value * 100.0
            ));
        }

        Ok(ModelResult {
            model_kind: ModelKind::Dcf,
            fair_value: valuation.intrinsic_value_per_share,
            confidence,
            assumptions_used: json!({
                "revenue_growth_rate": valuation.assumptions.revenue_growth_rate,
                "ebitda_margin": valuation.assumptions.ebitda_margin,
                "tax_rate": valuation.assumptions.tax_rate,
                "wacc": valuation.assumptions.wacc,
                "terminal_growth_rate": valuation.assumptions.terminal_growth_rate,
                "projection_years": valuation.assumptions.projection_years,
            }),
            reasoning,
            warnings: valuation.warnings,
        })
    }
}

/// Gordon growth dividend discount model.
pub struct DdmModel {
    config: ValuationConfig,
}

impl DdmModel {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    /// Net income CAGR clamped to `[0, max_dividend_growth]`, or the long-run
    /// rate when history is too short.
    fn dividend_growth(&self, ctx: &ModelContext<'_>, warnings: &mut Vec<ValuationWarning>) -> f64 {
        let models = &self.config.models;
        let points = ctx
            .history
            .net_income
            .iter()
            .filter(|v| v.is_finite() && **v > 0.0)
            .count();

        let estimate = if points >= self.config.min_data_points {
            (1..ctx.history.net_income.len())
                .rev()
                .find_map(|span| stats::cagr_most_recent_first(&ctx.history.net_income, span))
        } else {
            None
        };

        match estimate {
            Some(g) => g.max(0.0).min(models.max_dividend_growth),
            None => {
                warnings.push(ValuationWarning::data_insufficient(format!(
                    "{}: no usable net income trend; dividend growth set to {:.2}%",
                    ctx.history.ticker, self.config.long_run_growth_rate
                )));
                self.config.long_run_growth_rate.max(0.0).min(models.max_dividend_growth)
            }
        }
    }
}

impl ValuationModel for DdmModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Ddm
    }

    fn evaluate(&self, ctx: &ModelContext<'_>) -> Result<ModelResult, ValuationError> {
        let models = &self.config.models;
        let price = ctx.signal.price().ok_or_else(|| {
            ValuationError::InvalidInput("no price or book value to derive a dividend from".into())
        })?;
        if !(ctx.signal.dividend_yield.is_finite() && ctx.signal.dividend_yield > 0.0) {
            return Err(ValuationError::InvalidInput(format!(
                "{} pays no dividend",
                ctx.history.ticker
            )));
        }

        let mut warnings = Vec::new();
        let d0 = price * ctx.signal.dividend_yield / 100.0;
        let growth = self.dividend_growth(ctx, &mut warnings);

        let beta = if ctx.signal.beta.is_finite() { ctx.signal.beta } else { 1.0 };
        let raw_cost_of_equity = models.risk_free_rate + beta * models.equity_risk_premium;
        let (cost_of_equity, clamp_warning) = clamp_discount_rate(
            raw_cost_of_equity,
            growth,
            self.config.min_spread,
            self.config.spread_epsilon,
            "cost of equity",
        );
        warnings.extend(clamp_warning);

        let d1 = d0 * (1.0 + growth / 100.0);
        let fair_value = d1 / ((cost_of_equity - growth) / 100.0);
        if !fair_value.is_finite() {
            return Err(ValuationError::Calculation(format!(
                "dividend discount value is not finite (ke {:.2}%, g {:.2}%)",
                cost_of_equity, growth
            )));
        }

        let confidence = if warnings.is_empty() { 0.7 } else { 0.5 };
        Ok(ModelResult {
            model_kind: ModelKind::Ddm,
            fair_value,
            confidence,
            assumptions_used: json!({
                "current_dividend": d0,
                "dividend_growth": growth,
                "cost_of_equity": cost_of_equity,
                "beta": beta,
            }),
            reasoning: vec![
                format!("D1 {:.4} = D0 {:.4} grown at {:.2}%", d1, d0, growth),
                format!(
                    "Cost of equity {:.2}% = rf {:.2}% + beta {:.2} x ERP {:.2}%",
                    cost_of_equity, models.risk_free_rate, beta, models.equity_risk_premium
                ),
            ],
            warnings,
        })
    }
}

/// Book value with a going-concern premium.
pub struct AssetModel {
    config: ModelConfig,
}

impl AssetModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ValuationModel for AssetModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Asset
    }

    fn evaluate(&self, ctx: &ModelContext<'_>) -> Result<ModelResult, ValuationError> {
        let book = ctx.signal.book_value;
        if !(book.is_finite() && book > 0.0) {
            return Err(ValuationError::InvalidInput(format!(
                "book value per share {} is not positive",
                book
            )));
        }

        Ok(ModelResult {
            model_kind: ModelKind::Asset,
            fair_value: book * self.config.going_concern_premium,
            confidence: 0.6,
            assumptions_used: json!({
                "book_value": book,
                "going_concern_premium": self.config.going_concern_premium,
            }),
            reasoning: vec![format!(
                "Book value {:.2} x going-concern premium {:.2}",
                book, self.config.going_concern_premium
            )],
            warnings: Vec::new(),
        })
    }
}

/// The three standard models sharing one config.
pub fn default_models(config: &ValuationConfig) -> Vec<Box<dyn ValuationModel>> {
    vec![
        Box::new(DcfModel::new(DcfEngine::with_config(config.clone()))),
        Box::new(DdmModel::new(config.clone())),
        Box::new(AssetModel::new(config.models.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use valuation_core::{FinancialHistory, SectorSignal};

    fn history() -> FinancialHistory {
        FinancialHistory {
            ticker: "BANK".to_string(),
            years: vec![2024, 2023, 2022, 2021, 2020],
            revenue: vec![1000.0, 900.0, 800.0, 700.0, 600.0],
            ebitda: vec![200.0, 180.0, 160.0, 140.0, 120.0],
            net_income: vec![120.0, 105.0, 95.0, 80.0, 70.0],
            total_debt: vec![200.0],
            cash: vec![50.0],
            shares_outstanding: vec![100.0],
            ..Default::default()
        }
    }

    fn signal() -> SectorSignal {
        SectorSignal {
            sector_name: "Financials".to_string(),
            industry_name: "Banks".to_string(),
            beta: 1.0,
            dividend_yield: 2.0,
            book_value: 20.0,
            price_to_book: 1.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_ddm_gordon_growth() {
        let model = DdmModel::new(ValuationConfig::default());
        let (h, s) = (history(), signal());
        let result = model.evaluate(&ModelContext { history: &h, signal: &s }).unwrap();
        // price 30, D0 0.6, g capped at 8%, ke 10%
        assert_relative_eq!(result.fair_value, 0.6 * 1.08 / 0.02, epsilon = 1e-9);
        assert!(result.warnings.is_empty());
        assert_eq!(result.reasoning.len(), 2);
        assert!(result.reasoning[1].starts_with("Cost of equity 10.00% = rf 4.50%"));
    }

    #[test]
    fn test_ddm_clamps_cost_of_equity() {
        let model = DdmModel::new(ValuationConfig::default());
        let h = history();
        let s = SectorSignal { beta: 0.2, ..signal() };
        let result = model.evaluate(&ModelContext { history: &h, signal: &s }).unwrap();
        assert!(result.fair_value.is_finite() && result.fair_value > 0.0);
        assert!(result.warnings.iter().any(|w| w.tag() == "degenerate_assumptions"));
        assert_relative_eq!(result.assumptions_used["cost_of_equity"].as_f64().unwrap(), 10.0);
    }

    #[test]
    fn test_ddm_requires_dividend() {
        let model = DdmModel::new(ValuationConfig::default());
        let h = history();
        let s = SectorSignal { dividend_yield: 0.0, ..signal() };
        assert!(model.evaluate(&ModelContext { history: &h, signal: &s }).is_err());
    }

    #[test]
    fn test_ddm_short_history_uses_long_run_growth() {
        let model = DdmModel::new(ValuationConfig::default());
        let h = FinancialHistory { net_income: vec![120.0], ..history() };
        let s = signal();
        let result = model.evaluate(&ModelContext { history: &h, signal: &s }).unwrap();
        assert_relative_eq!(result.assumptions_used["dividend_growth"].as_f64().unwrap(), 4.0);
        assert!(result.warnings.iter().any(|w| w.tag() == "data_insufficient"));
    }

    #[test]
    fn test_asset_model() {
        let model = AssetModel::new(ModelConfig::default());
        let (h, s) = (history(), signal());
        let result = model.evaluate(&ModelContext { history: &h, signal: &s }).unwrap();
        assert_relative_eq!(result.fair_value, 24.0);

        let negative = SectorSignal { book_value: -5.0, ..signal() };
        assert!(model.evaluate(&ModelContext { history: &h, signal: &negative }).is_err());
    }

    #[test]
    fn test_dcf_confidence_drops_with_warnings() {
        let model = DcfModel::new(DcfEngine::new());
        let s = signal();
        let clean = history();
        let clean_result = model.evaluate(&ModelContext { history: &clean, signal: &s }).unwrap();
        assert_relative_eq!(clean_result.confidence, DCF_BASE_CONFIDENCE);

        let short = FinancialHistory {
            years: vec![2024, 2023],
            revenue: vec![1000.0, 900.0],
            ..history()
        };
        let short_result = model.evaluate(&ModelContext { history: &short, signal: &s }).unwrap();
        assert!(short_result.confidence < clean_result.confidence);
        assert!(short_result.confidence >= DCF_MIN_CONFIDENCE);
    }
}
