//! Sensitivity Analysis
//!
//! Re-runs the DCF pipeline across a wacc x terminal growth grid. Every cell
//! goes through [`DcfEngine::compute_valuation`], so the grid can never drift
//! from the point valuation.

use rayon::prelude::*;
use valuation_core::{Assumptions, FinancialHistory, SensitivityGrid, ValuationError, ValuationWarning};

use crate::engine::DcfEngine;

pub struct SensitivityEngine<'a> {
    engine: &'a DcfEngine,
}

impl<'a> SensitivityEngine<'a> {
    pub fn new(engine: &'a DcfEngine) -> Self {
        Self { engine }
    }

    /// Axis values: `base + offset` for each configured offset.
    pub fn axis(&self, base: f64) -> Vec<f64> {
        self.engine
            .config()
            .sensitivity_offsets
            .iter()
            .map(|offset| base + offset)
            .collect()
    }

    /// Build the grid. A structural fault in the base valuation (e.g. no
    /// shares outstanding) is returned as an error; a failing cell becomes
    /// `None` and the rest of the grid is still computed.
    pub fn compute(
        &self,
        history: &FinancialHistory,
        base: &Assumptions,
    ) -> Result<SensitivityGrid, ValuationError> {
        let base_valuation = self.engine.compute_valuation(history, base)?;

        let wacc_axis = self.axis(base.wacc);
        let terminal_growth_axis = self.axis(base.terminal_growth_rate);

        let rows: Vec<(Vec<Option<f64>>, Vec<ValuationWarning>)> = wacc_axis
            .par_iter()
            .map(|&wacc| {
                let mut cells = Vec::with_capacity(terminal_growth_axis.len());
                let mut warnings = Vec::new();
                for &growth in &terminal_growth_axis {
                    match self.engine.compute_valuation(history, &base.with_rates(wacc, growth)) {
                        Ok(valuation) => {
                            cells.push(Some(valuation.intrinsic_value_per_share));
                            warnings.extend(valuation.warnings);
                        }
                        Err(e) => {
                            cells.push(None);
                            warnings.push(ValuationWarning::data_insufficient(format!(
                                "cell wacc {:.2}% / growth {:.2}% not computed: {}",
                                wacc, growth, e
                            )));
                        }
                    }
                }
                (cells, warnings)
            })
            .collect();

        let mut matrix = Vec::with_capacity(rows.len());
        let mut warnings: Vec<ValuationWarning> = Vec::new();
        for (cells, row_warnings) in rows {
            matrix.push(cells);
            for w in row_warnings {
                if !warnings.contains(&w) {
                    warnings.push(w);
                }
            }
        }

        tracing::debug!(
            ticker = %history.ticker,
            rows = matrix.len(),
            warnings = warnings.len(),
            "Computed sensitivity grid"
        );

        Ok(SensitivityGrid {
            wacc_axis,
            terminal_growth_axis,
            matrix,
            base_value: Some(base_valuation.intrinsic_value_per_share),
            warnings,
        })
    }
}
