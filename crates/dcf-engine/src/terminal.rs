//! Terminal Value and Valuation Aggregation
//!
//! Perpetuity-growth terminal value, the enterprise-to-equity bridge and the
//! per-share conversion.

use serde::{Deserialize, Serialize};
use valuation_core::{
    Assumptions, FinancialHistory, Valuation, ValuationConfig, ValuationError,
    ValuationWarning, WarningSink,
};

use crate::growth_stages::GrowthSchedule;
use crate::projector::ProjectionRun;

/// Raise `discount_rate` to `growth_rate + min_spread` when the gap between
/// them is below `min_spread`. Returns the rate to use and, if it changed, a
/// [`ValuationWarning::DegenerateAssumptions`].
///
/// Shared by the perpetuity terminal value and the dividend discount model.
pub fn clamp_discount_rate(
    discount_rate: f64,
    growth_rate: f64,
    min_spread: f64,
    epsilon: f64,
    label: &str,
) -> (f64, Option<ValuationWarning>) {
    if discount_rate - growth_rate >= min_spread - epsilon {
        return (discount_rate, None);
    }
    let clamped = growth_rate + min_spread;
    let warning = ValuationWarning::degenerate(format!(
        "{} {:.2}% is within {:.2}pp of growth {:.2}%; clamped to {:.2}%",
        label, discount_rate, min_spread, growth_rate, clamped
    ));
    (clamped, Some(warning))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalValue {
    /// Value at the end of the explicit horizon
    pub terminal_value: f64,
    pub discount_factor: f64,
    /// Discounted to today
    pub present_value: f64,
}

impl TerminalValue {
    /// Set when the value or its discount factor left the floating point
    /// range and the present value was zeroed.
    pub fn overflow_warning(&self) -> Option<ValuationWarning> {
        let in_range = self.terminal_value.is_finite()
            && self.discount_factor.is_finite()
            && self.discount_factor > 0.0;
        (!in_range).then(|| {
            ValuationWarning::data_insufficient(format!(
                "Terminal value overflowed floating point range (value {}, discount factor {}); contributes zero present value",
                self.terminal_value, self.discount_factor
            ))
        })
    }
}

pub struct TerminalValueCalculator;

impl TerminalValueCalculator {
    /// Gordon growth terminal value on the last projected cash flow.
    ///
    /// Rates are percentages and must already satisfy the minimum spread
    /// (see [`clamp_discount_rate`]).
    pub fn calculate(
        last_fcf: f64,
        wacc: f64,
        terminal_growth: f64,
        years: u32,
    ) -> Result<TerminalValue, ValuationError> {
        let r = wacc / 100.0;
        let g = terminal_growth / 100.0;
        let denominator = r - g;
        if denominator <= 0.0 || !denominator.is_finite() {
            return Err(ValuationError::Calculation(format!(
                "terminal value denominator {} is not positive",
                denominator
            )));
        }

        let terminal_value = last_fcf * (1.0 + g) / denominator;
        let discount_factor = (1.0 + r).powi(years as i32);
        let present_value = if terminal_value.is_finite()
            && discount_factor.is_finite()
            && discount_factor > 0.0
        {
            terminal_value / discount_factor
        } else {
            0.0
        };

        Ok(TerminalValue {
            terminal_value,
            discount_factor,
            present_value,
        })
    }
}

pub struct ValuationAggregator<'a> {
    config: &'a ValuationConfig,
}

impl<'a> ValuationAggregator<'a> {
    pub fn new(config: &'a ValuationConfig) -> Self {
        Self { config }
    }

    /// Shares to divide equity by, in units.
    ///
    /// An explicit unit on the history wins. Without one, a share count that is
    /// implausibly small for the equity magnitude is assumed to be in millions
    /// and rescaled once.
    fn resolve_shares(
        &self,
        history: &FinancialHistory,
        equity_value: f64,
        warnings: &mut WarningSink,
    ) -> Result<f64, ValuationError> {
        let reported = history
            .latest_shares()
            .ok_or_else(|| ValuationError::NoSharesOutstanding(history.ticker.clone()))?;

        if let Some(unit) = history.share_unit {
            return Ok(reported * unit.multiplier());
        }

        let heuristic = &self.config.unit_heuristic;
        let per_share = equity_value / reported;
        if per_share.abs() > heuristic.max_plausible_per_share
            && reported < heuristic.share_rescale_factor
        {
            let rescaled = reported * heuristic.share_rescale_factor;
            warnings.push(ValuationWarning::unit_mismatch(format!(
                "{:.2} shares implies {:.2} per share on equity {:.2}; assuming shares are in millions ({:.0})",
                reported, per_share, equity_value, rescaled
            )));
            return Ok(rescaled);
        }
        Ok(reported)
    }

    pub fn aggregate(
        &self,
        history: &FinancialHistory,
        assumptions: Assumptions,
        schedule: GrowthSchedule,
        run: ProjectionRun,
        terminal: TerminalValue,
        mut warnings: WarningSink,
    ) -> Result<Valuation, ValuationError> {
        if let Some(w) = terminal.overflow_warning() {
            warnings.push(w);
        }

        let sum_pv_fcf = run.sum_present_value();
        let enterprise_value = sum_pv_fcf + terminal.present_value;
        let net_debt = history.net_debt();
        let equity_value = enterprise_value - net_debt;

        let shares_used = self.resolve_shares(history, equity_value, &mut warnings)?;
        let intrinsic_value_per_share = equity_value / shares_used;
        if !intrinsic_value_per_share.is_finite() {
            return Err(ValuationError::Calculation(format!(
                "per-share value is not finite (equity {}, shares {})",
                equity_value, shares_used
            )));
        }

        let growth_waterfall = Some(schedule.waterfall());

        Ok(Valuation {
            ticker: history.ticker.clone(),
            intrinsic_value_per_share,
            terminal_value: terminal.terminal_value,
            pv_terminal_value: terminal.present_value,
            sum_pv_fcf,
            enterprise_value,
            net_debt,
            equity_value,
            shares_used,
            projections: run.projections,
            stages: schedule.stages,
            assumptions,
            growth_waterfall,
            warnings: warnings.into_vec(),
        })
    }
}
