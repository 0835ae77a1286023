use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValuationWarning;

/// Unit the share count in a [`FinancialHistory`] is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareUnit {
    Units,
    Thousands,
    Millions,
}

impl ShareUnit {
    pub fn multiplier(&self) -> f64 {
        match self {
            ShareUnit::Units => 1.0,
            ShareUnit::Thousands => 1_000.0,
            ShareUnit::Millions => 1_000_000.0,
        }
    }
}

/// Annual financial history, most recent year first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialHistory {
    pub ticker: String,
    pub years: Vec<i32>,
    #[serde(default)]
    pub revenue: Vec<f64>,
    #[serde(default)]
    pub ebitda: Vec<f64>,
    #[serde(default)]
    pub net_income: Vec<f64>,
    #[serde(default)]
    pub fcf: Vec<f64>,
    #[serde(default)]
    pub total_debt: Vec<f64>,
    #[serde(default)]
    pub cash: Vec<f64>,
    #[serde(default)]
    pub shares_outstanding: Vec<f64>,
    /// Explicit unit of `shares_outstanding`. When absent the engine falls back
    /// to a magnitude heuristic.
    #[serde(default)]
    pub share_unit: Option<ShareUnit>,
}

impl FinancialHistory {
    /// Years are expected in descending order (most recent first).
    pub fn is_most_recent_first(&self) -> bool {
        self.years.windows(2).all(|w| w[0] > w[1])
    }

    /// Number of years carrying a non-zero, finite revenue figure.
    pub fn revenue_data_points(&self) -> usize {
        self.revenue.iter().filter(|r| r.is_finite() && **r != 0.0).count()
    }

    /// Most recent non-zero revenue and its index, walking back through history.
    pub fn latest_nonzero_revenue(&self) -> Option<(usize, f64)> {
        self.revenue
            .iter()
            .copied()
            .enumerate()
            .find(|(_, r)| r.is_finite() && *r != 0.0)
    }

    /// Most recent positive share count, walking back through history.
    pub fn latest_shares(&self) -> Option<f64> {
        self.shares_outstanding
            .iter()
            .copied()
            .find(|s| s.is_finite() && *s > 0.0)
    }

    pub fn latest_debt(&self) -> f64 {
        self.total_debt.first().copied().filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    pub fn latest_cash(&self) -> f64 {
        self.cash.first().copied().filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    pub fn net_debt(&self) -> f64 {
        self.latest_debt() - self.latest_cash()
    }

    pub fn is_empty(&self) -> bool {
        self.revenue.is_empty()
            && self.ebitda.is_empty()
            && self.net_income.is_empty()
            && self.fcf.is_empty()
            && self.shares_outstanding.is_empty()
    }
}

/// How company-specific growth is faded toward the long-run rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMode {
    /// Rule-based fade from a single averaged historical rate.
    #[default]
    Simple,
    /// Recency-weighted historical estimates with a finer fade.
    Enhanced,
}

/// Valuation assumptions. All rates are percentages (10.0 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub revenue_growth_rate: f64,
    pub ebitda_margin: f64,
    pub tax_rate: f64,
    pub wacc: f64,
    pub terminal_growth_rate: f64,
    pub projection_years: u32,
    #[serde(default)]
    pub growth_mode: GrowthMode,
}

impl Assumptions {
    pub fn with_rates(&self, wacc: f64, terminal_growth_rate: f64) -> Self {
        Self {
            wacc,
            terminal_growth_rate,
            ..self.clone()
        }
    }
}

/// Tag describing how a stage's rate was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMethod {
    CompanySpecific,
    GdpBlend,
    LongRunTarget,
    ConservativeFlat,
}

impl BlendMethod {
    pub fn from_weight(gdp_weight: f64) -> Self {
        if gdp_weight <= 0.0 {
            BlendMethod::CompanySpecific
        } else if gdp_weight >= 1.0 {
            BlendMethod::LongRunTarget
        } else {
            BlendMethod::GdpBlend
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMethod::CompanySpecific => "company_specific",
            BlendMethod::GdpBlend => "gdp_blend",
            BlendMethod::LongRunTarget => "long_run_target",
            BlendMethod::ConservativeFlat => "conservative_flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageConfidence {
    Low,
    Medium,
    High,
}

impl StageConfidence {
    pub fn downgrade(self) -> Self {
        match self {
            StageConfidence::High => StageConfidence::Medium,
            _ => StageConfidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageConfidence::Low => "low",
            StageConfidence::Medium => "medium",
            StageConfidence::High => "high",
        }
    }
}

/// One contiguous block of projection years sharing a growth rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStage {
    /// First projected year of the stage (1-based, inclusive)
    pub start_year: u32,
    /// Last projected year of the stage (inclusive)
    pub end_year: u32,
    pub growth_rate: f64,
    pub method: BlendMethod,
    /// Weight of the long-run rate in the blend, 0.0 to 1.0
    pub gdp_weight: f64,
    pub confidence: StageConfidence,
    pub rationale: String,
}

impl GrowthStage {
    pub fn label(&self) -> String {
        if self.start_year == self.end_year {
            format!("Year {}", self.start_year)
        } else {
            format!("Years {}-{}", self.start_year, self.end_year)
        }
    }

    pub fn contains(&self, year: u32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }

    pub fn len(&self) -> u32 {
        self.end_year + 1 - self.start_year
    }

    pub fn is_empty(&self) -> bool {
        self.end_year < self.start_year
    }
}

/// A single projected year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub year: u32,
    pub growth_rate: f64,
    pub revenue: f64,
    pub ebitda: f64,
    pub depreciation: f64,
    pub ebit: f64,
    pub tax: f64,
    pub nopat: f64,
    pub capex: f64,
    pub working_capital_change: f64,
    pub free_cash_flow: f64,
    pub discount_factor: f64,
    pub present_value: f64,
    /// Label of the originating stage, e.g. "Years 1-2"
    pub stage: String,
    pub method: BlendMethod,
}

/// Point valuation from the DCF pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub ticker: String,
    pub intrinsic_value_per_share: f64,
    pub terminal_value: f64,
    pub pv_terminal_value: f64,
    pub sum_pv_fcf: f64,
    pub enterprise_value: f64,
    pub net_debt: f64,
    pub equity_value: f64,
    pub shares_used: f64,
    pub projections: Vec<Projection>,
    pub stages: Vec<GrowthStage>,
    /// Normalized assumptions actually used
    pub assumptions: Assumptions,
    pub growth_waterfall: Option<BTreeMap<String, f64>>,
    pub warnings: Vec<ValuationWarning>,
}

/// Intrinsic value per share across a wacc x terminal growth grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub wacc_axis: Vec<f64>,
    pub terminal_growth_axis: Vec<f64>,
    /// `matrix[i][j]` is the value at `wacc_axis[i]`, `terminal_growth_axis[j]`.
    /// `None` marks a cell that could not be computed.
    pub matrix: Vec<Vec<Option<f64>>>,
    pub base_value: Option<f64>,
    pub warnings: Vec<ValuationWarning>,
}

impl SensitivityGrid {
    pub fn cell(&self, wacc_idx: usize, growth_idx: usize) -> Option<f64> {
        self.matrix.get(wacc_idx)?.get(growth_idx).copied().flatten()
    }

    pub fn computed_cells(&self) -> usize {
        self.matrix.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Valuation model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    Dcf,
    Ddm,
    Asset,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Dcf => "DCF",
            ModelKind::Ddm => "DDM",
            ModelKind::Asset => "Asset",
        }
    }

    pub fn all() -> [ModelKind; 3] {
        [ModelKind::Dcf, ModelKind::Ddm, ModelKind::Asset]
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sector and market signal handed over by the classification collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectorSignal {
    pub sector_name: String,
    pub industry_name: String,
    #[serde(default)]
    pub market: Option<String>,
    pub beta: f64,
    /// Dividend yield in percent
    pub dividend_yield: f64,
    /// Book value per share
    pub book_value: f64,
    pub price_to_book: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
}

impl SectorSignal {
    /// Quoted price, or the one implied by book value and P/B.
    pub fn price(&self) -> Option<f64> {
        match self.current_price {
            Some(p) if p.is_finite() && p > 0.0 => Some(p),
            _ => {
                let implied = self.book_value * self.price_to_book;
                (implied.is_finite() && implied > 0.0).then_some(implied)
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.sector_name.trim().is_empty() && self.industry_name.trim().is_empty()
    }
}

/// Output of a single valuation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_kind: ModelKind,
    pub fair_value: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub assumptions_used: serde_json::Value,
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<ValuationWarning>,
}

/// Consensus recommendation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    /// Map percentage upside (positive) or downside (negative) to a label.
    pub fn from_upside(upside_pct: f64, strong: f64, moderate: f64) -> Self {
        match upside_pct {
            u if u > strong => Recommendation::StrongBuy,
            u if u > moderate => Recommendation::Buy,
            u if u < -strong => Recommendation::StrongSell,
            u if u < -moderate => Recommendation::Sell,
            _ => Recommendation::Hold,
        }
    }

    /// Strong labels become their moderate counterpart.
    pub fn soften(self) -> Self {
        match self {
            Recommendation::StrongBuy => Recommendation::Buy,
            Recommendation::StrongSell => Recommendation::Sell,
            other => other,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Sell => "Sell",
            Recommendation::StrongSell => "Strong Sell",
        }
    }
}

/// Aggregate across all succeeding models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub primary_model: ModelKind,
    pub model_results: Vec<ModelResult>,
    pub min_value: f64,
    pub max_value: f64,
    pub mean_value: f64,
    pub median_value: f64,
    /// (max - min) / mean
    pub spread: f64,
    /// max(0, 1 - coefficient of variation)
    pub agreement_score: f64,
    pub current_price: Option<f64>,
    pub upside_pct: Option<f64>,
    pub recommendation: Recommendation,
    pub warnings: Vec<ValuationWarning>,
}

/// Explicit result of a step that may have used a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok(T),
    Fallback(T, String),
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(v) | Outcome::Fallback(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Ok(v) | Outcome::Fallback(v, _) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback(..))
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Outcome::Fallback(_, reason) => Some(reason),
            Outcome::Ok(_) => None,
        }
    }
}
