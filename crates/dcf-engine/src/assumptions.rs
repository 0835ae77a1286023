//! Default assumptions and normalization.

use valuation_core::stats;
use valuation_core::{Assumptions, FinancialHistory, GrowthMode, ValuationConfig, ValuationError, ValuationWarning};

use crate::terminal::clamp_discount_rate;

/// Derive assumptions from history, filling gaps from config defaults.
pub fn default_assumptions(history: &FinancialHistory, config: &ValuationConfig) -> Assumptions {
    let defaults = &config.defaults;

    let revenue_growth_rate = if history.revenue_data_points() >= config.min_data_points {
        longest_revenue_cagr(history)
            .map(|g| config.clamp_growth(g))
            .unwrap_or(defaults.revenue_growth_rate)
    } else {
        defaults.revenue_growth_rate
    };

    let margins: Vec<f64> = history
        .revenue
        .iter()
        .zip(history.ebitda.iter())
        .filter(|(r, e)| **r > 0.0 && r.is_finite() && e.is_finite())
        .map(|(r, e)| e / r * 100.0)
        .collect();
    let ebitda_margin = if margins.is_empty() {
        defaults.ebitda_margin
    } else {
        stats::mean(&margins).max(0.0).min(defaults.max_ebitda_margin)
    };

    Assumptions {
        revenue_growth_rate,
        ebitda_margin,
        tax_rate: defaults.tax_rate,
        wacc: defaults.wacc,
        terminal_growth_rate: defaults.terminal_growth_rate,
        projection_years: defaults.projection_years,
        growth_mode: GrowthMode::Simple,
    }
}

/// CAGR across the longest span with positive endpoints.
pub fn longest_revenue_cagr(history: &FinancialHistory) -> Option<f64> {
    (1..history.revenue.len())
        .rev()
        .find_map(|span| stats::cagr_most_recent_first(&history.revenue, span))
}

/// Growth estimates derived from history, most recent first: 3-year CAGR,
/// then full-span CAGR when it differs.
pub fn historical_growth_estimates(history: &FinancialHistory) -> Vec<f64> {
    let mut estimates = Vec::new();
    if let Some(g) = stats::cagr_most_recent_first(&history.revenue, 3) {
        estimates.push(g);
    }
    let full_span = history.revenue.len().saturating_sub(1);
    if full_span > 3 {
        if let Some(g) = stats::cagr_most_recent_first(&history.revenue, full_span) {
            estimates.push(g);
        }
    }
    estimates
}

/// Bring assumptions into the valid domain.
///
/// Non-finite rates are a structural fault. A horizon outside
/// `[1, max_projection_years]`, a tax rate outside `[0, 100]`, a terminal
/// growth rate outside the growth bounds and a wacc too close to terminal
/// growth are clamped with a warning.
pub fn normalize(
    assumptions: &Assumptions,
    config: &ValuationConfig,
) -> Result<(Assumptions, Vec<ValuationWarning>), ValuationError> {
    let rates = [
        ("revenue_growth_rate", assumptions.revenue_growth_rate),
        ("ebitda_margin", assumptions.ebitda_margin),
        ("tax_rate", assumptions.tax_rate),
        ("wacc", assumptions.wacc),
        ("terminal_growth_rate", assumptions.terminal_growth_rate),
    ];
    if let Some((name, value)) = rates.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ValuationError::InvalidInput(format!("{} is not finite: {}", name, value)));
    }

    let mut warnings = Vec::new();
    let mut normalized = assumptions.clone();

    let years = assumptions.projection_years.min(config.max_projection_years).max(1);
    if years != assumptions.projection_years {
        warnings.push(ValuationWarning::degenerate(format!(
            "projection_years {} outside [1, {}]; using {}",
            assumptions.projection_years, config.max_projection_years, years
        )));
        normalized.projection_years = years;
    }

    let tax = assumptions.tax_rate.clamp(0.0, 100.0);
    if tax != assumptions.tax_rate {
        warnings.push(ValuationWarning::degenerate(format!(
            "tax_rate {:.2}% outside [0, 100]; using {:.2}%",
            assumptions.tax_rate, tax
        )));
        normalized.tax_rate = tax;
    }

    let terminal_growth = config.clamp_growth(assumptions.terminal_growth_rate);
    if terminal_growth != assumptions.terminal_growth_rate {
        warnings.push(ValuationWarning::degenerate(format!(
            "terminal_growth_rate {:.2}% outside [{:.2}, {:.2}]; using {:.2}%",
            assumptions.terminal_growth_rate,
            config.min_growth_rate,
            config.max_growth_rate,
            terminal_growth
        )));
        normalized.terminal_growth_rate = terminal_growth;
    }

    let (wacc, warning) = clamp_discount_rate(
        assumptions.wacc,
        terminal_growth,
        config.min_spread,
        config.spread_epsilon,
        "WACC",
    );
    normalized.wacc = wacc;
    warnings.extend(warning);

    Ok((normalized, warnings))
}
