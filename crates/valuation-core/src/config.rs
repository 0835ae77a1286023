use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Fractions of revenue used by the cash-flow projector (0.03 = 3%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub depreciation_fraction: f64,
    pub capex_fraction: f64,
    /// Applied to the year-over-year revenue change
    pub working_capital_fraction: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            depreciation_fraction: 0.03,
            capex_fraction: 0.02,
            working_capital_fraction: 0.01,
        }
    }
}

/// Fallback assumptions when history cannot support an estimate (percent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultAssumptionsConfig {
    pub revenue_growth_rate: f64,
    pub ebitda_margin: f64,
    pub max_ebitda_margin: f64,
    pub tax_rate: f64,
    pub wacc: f64,
    pub terminal_growth_rate: f64,
    pub projection_years: u32,
}

impl Default for DefaultAssumptionsConfig {
    fn default() -> Self {
        Self {
            revenue_growth_rate: 5.0,
            ebitda_margin: 20.0,
            max_ebitda_margin: 80.0,
            tax_rate: 21.0,
            wacc: 10.0,
            terminal_growth_rate: 3.0,
            projection_years: 5,
        }
    }
}

/// Share-count unit heuristic, applied only when the history carries no explicit unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitHeuristicConfig {
    /// Per-share values above this suggest shares were reported in millions
    pub max_plausible_per_share: f64,
    pub share_rescale_factor: f64,
}

impl Default for UnitHeuristicConfig {
    fn default() -> Self {
        Self {
            max_plausible_per_share: 100_000.0,
            share_rescale_factor: 1_000_000.0,
        }
    }
}

/// Dividend-discount and asset model parameters (percent unless noted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,
    pub max_dividend_growth: f64,
    /// Multiplier on book value, e.g. 1.2
    pub going_concern_premium: f64,
    /// Fraction of gross sum-of-the-parts value, e.g. 0.15
    pub conglomerate_discount: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 4.5,
            equity_risk_premium: 5.5,
            max_dividend_growth: 8.0,
            going_concern_premium: 1.2,
            conglomerate_discount: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub strong_threshold: f64,
    pub moderate_threshold: f64,
    pub min_agreement_for_strong: f64,
    pub min_confidence_for_strong: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 20.0,
            moderate_threshold: 10.0,
            min_agreement_for_strong: 0.5,
            min_confidence_for_strong: 0.5,
        }
    }
}

/// Every tunable constant of the valuation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Minimum gap between wacc and terminal growth, percentage points
    pub min_spread: f64,
    pub spread_epsilon: f64,
    pub min_growth_rate: f64,
    pub max_growth_rate: f64,
    /// Minimum revenue data points before history-driven growth is trusted
    pub min_data_points: usize,
    /// Nominal GDP growth used as the long-run fade target
    pub long_run_growth_rate: f64,
    pub max_projection_years: u32,
    /// Sample std dev of growth estimates (pp) above which stage confidence drops
    pub growth_dispersion_threshold: f64,
    pub sensitivity_offsets: Vec<f64>,
    pub projection: ProjectionConfig,
    pub defaults: DefaultAssumptionsConfig,
    pub unit_heuristic: UnitHeuristicConfig,
    pub models: ModelConfig,
    pub recommendation: RecommendationConfig,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            min_spread: 2.0,
            spread_epsilon: 1e-9,
            min_growth_rate: -5.0,
            max_growth_rate: 25.0,
            min_data_points: 3,
            long_run_growth_rate: 4.0,
            max_projection_years: 30,
            growth_dispersion_threshold: 5.0,
            sensitivity_offsets: vec![-1.0, -0.5, 0.0, 0.5, 1.0],
            projection: ProjectionConfig::default(),
            defaults: DefaultAssumptionsConfig::default(),
            unit_heuristic: UnitHeuristicConfig::default(),
            models: ModelConfig::default(),
            recommendation: RecommendationConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl ValuationConfig {
    /// Default config with overrides from `VALUATION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let base = Self::default();

        let config = Self {
            min_spread: env_or("VALUATION_MIN_SPREAD", base.min_spread)?,
            min_growth_rate: env_or("VALUATION_MIN_GROWTH", base.min_growth_rate)?,
            max_growth_rate: env_or("VALUATION_MAX_GROWTH", base.max_growth_rate)?,
            min_data_points: env_or("VALUATION_MIN_DATA_POINTS", base.min_data_points)?,
            long_run_growth_rate: env_or("VALUATION_GDP_GROWTH", base.long_run_growth_rate)?,
            defaults: DefaultAssumptionsConfig {
                wacc: env_or("VALUATION_DEFAULT_WACC", base.defaults.wacc)?,
                terminal_growth_rate: env_or(
                    "VALUATION_TERMINAL_GROWTH",
                    base.defaults.terminal_growth_rate,
                )?,
                ..base.defaults.clone()
            },
            models: ModelConfig {
                risk_free_rate: env_or("VALUATION_RISK_FREE_RATE", base.models.risk_free_rate)?,
                ..base.models.clone()
            },
            ..base
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("min_spread", self.min_spread),
            ("spread_epsilon", self.spread_epsilon),
            ("min_growth_rate", self.min_growth_rate),
            ("max_growth_rate", self.max_growth_rate),
            ("long_run_growth_rate", self.long_run_growth_rate),
            ("growth_dispersion_threshold", self.growth_dispersion_threshold),
            ("defaults.max_ebitda_margin", self.defaults.max_ebitda_margin),
            ("models.risk_free_rate", self.models.risk_free_rate),
            ("models.equity_risk_premium", self.models.equity_risk_premium),
            ("models.max_dividend_growth", self.models.max_dividend_growth),
            ("models.going_concern_premium", self.models.going_concern_premium),
            ("models.conglomerate_discount", self.models.conglomerate_discount),
        ];
        if let Some((name, value)) = rates.iter().find(|(_, v)| !v.is_finite()) {
            anyhow::bail!("{} must be finite, got {}", name, value);
        }
        if self.min_spread <= 0.0 {
            anyhow::bail!("min_spread must be positive, got {}", self.min_spread);
        }
        if self.min_growth_rate >= self.max_growth_rate {
            anyhow::bail!(
                "growth bounds are inverted: {} >= {}",
                self.min_growth_rate,
                self.max_growth_rate
            );
        }
        if self.max_projection_years == 0 {
            anyhow::bail!("max_projection_years must be at least 1");
        }
        if !(0.0..1.0).contains(&self.models.conglomerate_discount) {
            anyhow::bail!("conglomerate_discount must be in [0, 1)");
        }
        Ok(())
    }

    /// Bound a growth rate to `[min_growth_rate, max_growth_rate]`. A NaN
    /// bound is ignored rather than panicking.
    pub fn clamp_growth(&self, rate: f64) -> f64 {
        rate.max(self.min_growth_rate).min(self.max_growth_rate)
    }
}
