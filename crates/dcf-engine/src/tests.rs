use approx::assert_relative_eq;
use valuation_core::{
    Assumptions, BlendMethod, FinancialHistory, GrowthMode, ShareUnit, ValuationConfig,
    ValuationError, ValuationWarning,
};

use crate::engine::DcfEngine;

/// Helper: five years of history in millions, most recent first.
fn history() -> FinancialHistory {
    FinancialHistory {
        ticker: "ACME".to_string(),
        years: vec![2024, 2023, 2022, 2021, 2020],
        revenue: vec![1000.0, 900.0, 800.0, 700.0, 600.0],
        ebitda: vec![200.0, 180.0, 160.0, 140.0, 120.0],
        net_income: vec![120.0, 105.0, 95.0, 80.0, 70.0],
        fcf: vec![110.0, 95.0, 85.0, 70.0, 60.0],
        total_debt: vec![200.0, 210.0, 220.0, 230.0, 240.0],
        cash: vec![50.0, 45.0, 40.0, 35.0, 30.0],
        shares_outstanding: vec![100.0, 101.0, 102.0, 103.0, 104.0],
        share_unit: None,
    }
}

/// Helper: the reference assumption set.
fn assumptions() -> Assumptions {
    Assumptions {
        revenue_growth_rate: 10.0,
        ebitda_margin: 20.0,
        tax_rate: 25.0,
        wacc: 12.0,
        terminal_growth_rate: 4.0,
        projection_years: 5,
        growth_mode: GrowthMode::Simple,
    }
}

fn has_warning(warnings: &[ValuationWarning], tag: &str) -> bool {
    warnings.iter().any(|w| w.tag() == tag)
}

#[test]
fn test_reference_example() {
    let engine = DcfEngine::new();
    let valuation = engine.compute_valuation(&history(), &assumptions()).unwrap();

    assert_relative_eq!(valuation.projections[0].revenue, 1100.0, epsilon = 1e-9);
    assert_eq!(valuation.projections.len(), 5);
    assert!(valuation.enterprise_value > 0.0);
    assert!(valuation.terminal_value > 0.0);
    assert!(valuation.warnings.is_empty());

    assert_relative_eq!(valuation.net_debt, 150.0);
    assert_relative_eq!(valuation.equity_value, valuation.enterprise_value - 150.0, epsilon = 1e-9);
    assert_relative_eq!(valuation.shares_used, 100.0);
    assert_relative_eq!(
        valuation.intrinsic_value_per_share,
        valuation.equity_value / 100.0,
        epsilon = 1e-12
    );
}

#[test]
fn test_enterprise_value_is_pv_fcf_plus_pv_terminal() {
    let engine = DcfEngine::new();
    let valuation = engine.compute_valuation(&history(), &assumptions()).unwrap();
    let sum_pv: f64 = valuation.projections.iter().map(|p| p.present_value).sum();
    assert_relative_eq!(valuation.sum_pv_fcf, sum_pv, epsilon = 1e-9);
    assert_relative_eq!(
        valuation.enterprise_value,
        sum_pv + valuation.pv_terminal_value,
        epsilon = 1e-9
    );
    let last = valuation.projections.last().unwrap();
    assert_relative_eq!(
        valuation.terminal_value,
        last.free_cash_flow * 1.04 / (0.12 - 0.04),
        epsilon = 1e-6
    );
}

#[test]
fn test_terminal_value_positive_for_valid_rates() {
    let engine = DcfEngine::new();
    for wacc in [7.0, 9.0, 12.0, 15.0] {
        for growth in [0.0, 2.0, 3.0, 4.5] {
            if wacc - growth < 2.0 {
                continue;
            }
            let v = engine
                .compute_valuation(&history(), &assumptions().with_rates(wacc, growth))
                .unwrap();
            assert!(v.terminal_value > 0.0, "wacc {} growth {}", wacc, growth);
            assert!(v.enterprise_value > v.sum_pv_fcf, "wacc {} growth {}", wacc, growth);
        }
    }
}

#[test]
fn test_degenerate_rates_clamp_instead_of_failing() {
    let engine = DcfEngine::new();
    let valuation = engine
        .compute_valuation(&history(), &assumptions().with_rates(4.0, 4.0))
        .unwrap();
    assert!(valuation.assumptions.wacc >= 6.0);
    assert!(has_warning(&valuation.warnings, "degenerate_assumptions"));
    assert!(valuation.terminal_value.is_finite());
}

#[test]
fn test_last_stage_meets_terminal_growth() {
    let engine = DcfEngine::new();
    for years in [1, 3, 5, 10, 20] {
        let mut a = assumptions();
        a.projection_years = years;
        let valuation = engine.compute_valuation(&history(), &a).unwrap();
        let last = valuation.stages.last().unwrap();
        assert_relative_eq!(last.growth_rate, 4.0, epsilon = 1e-12);
        assert_eq!(last.end_year, years);
        assert_eq!(valuation.projections.len(), years as usize);
    }
}

#[test]
fn test_out_of_bounds_terminal_growth_shared_by_fade_and_perpetuity() {
    let engine = DcfEngine::new();
    let valuation = engine
        .compute_valuation(&history(), &assumptions().with_rates(35.0, 30.0))
        .unwrap();
    assert_relative_eq!(valuation.assumptions.terminal_growth_rate, 25.0);
    assert_relative_eq!(valuation.assumptions.wacc, 35.0);
    assert!(has_warning(&valuation.warnings, "degenerate_assumptions"));
    let last_stage = valuation.stages.last().unwrap();
    assert_relative_eq!(last_stage.growth_rate, 25.0, epsilon = 1e-12);
    let last = valuation.projections.last().unwrap();
    assert_relative_eq!(
        valuation.terminal_value,
        last.free_cash_flow * 1.25 / (0.35 - 0.25),
        epsilon = 1e-6
    );
}

#[test]
fn test_terminal_overflow_reported_in_valuation() {
    let engine = DcfEngine::new();
    let mut a = assumptions().with_rates(1.0e14, 4.0);
    a.projection_years = 30;
    let valuation = engine.compute_valuation(&history(), &a).unwrap();
    assert_eq!(valuation.pv_terminal_value, 0.0);
    assert!(valuation.enterprise_value.is_finite());
    assert!(valuation
        .warnings
        .iter()
        .any(|w| w.tag() == "data_insufficient" && w.message().contains("Terminal value overflowed")));
}

#[test]
fn test_nan_growth_bound_does_not_panic() {
    let engine = DcfEngine::with_config(ValuationConfig {
        min_growth_rate: f64::NAN,
        ..Default::default()
    });
    let valuation = engine.compute_valuation(&history(), &assumptions()).unwrap();
    assert!(valuation.intrinsic_value_per_share.is_finite());
    assert_relative_eq!(valuation.stages.last().unwrap().growth_rate, 4.0, epsilon = 1e-12);
}

#[test]
fn test_growth_waterfall_matches_stages() {
    let engine = DcfEngine::new();
    let valuation = engine.compute_valuation(&history(), &assumptions()).unwrap();
    let waterfall = valuation.growth_waterfall.unwrap();
    assert_eq!(waterfall.len(), valuation.stages.len());
    assert_relative_eq!(waterfall["stage_1"], 10.0);
    assert_eq!(valuation.projections[0].stage, "Years 1-2");
    assert_eq!(valuation.projections[0].method, BlendMethod::CompanySpecific);
}

#[test]
fn test_valuation_is_idempotent() {
    let engine = DcfEngine::new();
    let a = engine.compute_valuation(&history(), &assumptions()).unwrap();
    let b = engine.compute_valuation(&history(), &assumptions()).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_short_history_uses_flat_schedule() {
    let engine = DcfEngine::new();
    let h = FinancialHistory {
        years: vec![2024, 2023],
        revenue: vec![1000.0, 900.0],
        ..history()
    };
    let valuation = engine.compute_valuation(&h, &assumptions()).unwrap();
    assert_eq!(valuation.stages.len(), 1);
    assert_eq!(valuation.stages[0].method, BlendMethod::ConservativeFlat);
    assert_relative_eq!(valuation.projections[0].revenue, 1040.0, epsilon = 1e-9);
    assert!(has_warning(&valuation.warnings, "data_insufficient"));
}

#[test]
fn test_enhanced_mode_blends_history_estimates() {
    let engine = DcfEngine::new();
    let mut a = assumptions();
    a.growth_mode = GrowthMode::Enhanced;
    let valuation = engine.compute_valuation(&history(), &a).unwrap();
    // Assumption rate plus the 3-year and 4-year CAGRs (both above 10%)
    assert!(valuation.stages[0].growth_rate > 10.0);
    assert_relative_eq!(valuation.stages.last().unwrap().growth_rate, 4.0, epsilon = 1e-12);
}

#[test]
fn test_missing_shares_is_fatal() {
    let engine = DcfEngine::new();
    let h = FinancialHistory {
        shares_outstanding: vec![0.0; 5],
        ..history()
    };
    assert!(matches!(
        engine.compute_valuation(&h, &assumptions()),
        Err(ValuationError::NoSharesOutstanding(_))
    ));
    assert!(engine.compute_sensitivity(&h, &assumptions()).is_err());
}

#[test]
fn test_empty_history_is_fatal() {
    let engine = DcfEngine::new();
    let h = FinancialHistory {
        ticker: "NONE".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        engine.compute_valuation(&h, &assumptions()),
        Err(ValuationError::EmptyHistory(_))
    ));
}

#[test]
fn test_ascending_years_rejected() {
    let engine = DcfEngine::new();
    let h = FinancialHistory {
        years: vec![2020, 2021, 2022, 2023, 2024],
        ..history()
    };
    assert!(matches!(
        engine.compute_valuation(&h, &assumptions()),
        Err(ValuationError::InvalidInput(_))
    ));
}

#[test]
fn test_shares_in_millions_rescaled_once() {
    let engine = DcfEngine::new();
    // Financials in raw currency units, shares reported in millions
    let h = FinancialHistory {
        revenue: history().revenue.iter().map(|r| r * 1e6).collect(),
        total_debt: vec![200e6],
        cash: vec![50e6],
        shares_outstanding: vec![100.0],
        ..history()
    };
    let valuation = engine.compute_valuation(&h, &assumptions()).unwrap();
    assert!(has_warning(&valuation.warnings, "unit_mismatch_suspected"));
    assert_relative_eq!(valuation.shares_used, 100e6);

    let reference = engine.compute_valuation(&history(), &assumptions()).unwrap();
    assert_relative_eq!(
        valuation.intrinsic_value_per_share,
        reference.intrinsic_value_per_share,
        max_relative = 1e-9
    );
}

#[test]
fn test_explicit_share_unit_skips_heuristic() {
    let engine = DcfEngine::new();
    let h = FinancialHistory {
        revenue: history().revenue.iter().map(|r| r * 1e6).collect(),
        total_debt: vec![200e6],
        cash: vec![50e6],
        shares_outstanding: vec![100.0],
        share_unit: Some(ShareUnit::Millions),
        ..history()
    };
    let valuation = engine.compute_valuation(&h, &assumptions()).unwrap();
    assert!(!has_warning(&valuation.warnings, "unit_mismatch_suspected"));
    assert_relative_eq!(valuation.shares_used, 100e6);
}

#[test]
fn test_sensitivity_grid_shape() {
    let engine = DcfEngine::new();
    let grid = engine.compute_sensitivity(&history(), &assumptions()).unwrap();
    assert_eq!(grid.wacc_axis, vec![11.0, 11.5, 12.0, 12.5, 13.0]);
    assert_eq!(grid.terminal_growth_axis, vec![3.0, 3.5, 4.0, 4.5, 5.0]);
    assert_eq!(grid.matrix.len(), grid.wacc_axis.len());
    for row in &grid.matrix {
        assert_eq!(row.len(), grid.terminal_growth_axis.len());
    }
    assert_eq!(grid.computed_cells(), 25);
    assert_eq!(grid.cell(2, 2), grid.base_value);
}

#[test]
fn test_sensitivity_cells_match_direct_valuation() {
    let engine = DcfEngine::new();
    let base = assumptions();
    let grid = engine.compute_sensitivity(&history(), &base).unwrap();
    for (i, &wacc) in grid.wacc_axis.iter().enumerate() {
        for (j, &growth) in grid.terminal_growth_axis.iter().enumerate() {
            let direct = engine
                .compute_valuation(&history(), &base.with_rates(wacc, growth))
                .unwrap();
            assert_eq!(grid.cell(i, j), Some(direct.intrinsic_value_per_share));
        }
    }
}

#[test]
fn test_sensitivity_value_falls_as_wacc_rises() {
    let engine = DcfEngine::new();
    let grid = engine.compute_sensitivity(&history(), &assumptions()).unwrap();
    for j in 0..grid.terminal_growth_axis.len() {
        for i in 1..grid.wacc_axis.len() {
            assert!(grid.cell(i, j).unwrap() < grid.cell(i - 1, j).unwrap());
        }
    }
}

#[test]
fn test_sensitivity_degenerate_cells_still_computed() {
    let engine = DcfEngine::new();
    let grid = engine
        .compute_sensitivity(&history(), &assumptions().with_rates(5.0, 3.0))
        .unwrap();
    assert_eq!(grid.computed_cells(), 25);
    assert!(has_warning(&grid.warnings, "degenerate_assumptions"));
    let unique: std::collections::HashSet<String> =
        grid.warnings.iter().map(|w| w.to_string()).collect();
    assert_eq!(unique.len(), grid.warnings.len());
}

#[test]
fn test_sensitivity_uncomputable_cell_is_none() {
    let engine = DcfEngine::with_config(ValuationConfig {
        sensitivity_offsets: vec![-1.0, 0.0, f64::INFINITY],
        ..Default::default()
    });
    let grid = engine.compute_sensitivity(&history(), &assumptions()).unwrap();
    for (i, j) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        assert!(grid.cell(i, j).is_some(), "cell ({}, {})", i, j);
    }
    for k in 0..3 {
        assert_eq!(grid.cell(k, 2), None);
        assert_eq!(grid.cell(2, k), None);
    }
    assert_eq!(grid.computed_cells(), 4);
    assert_eq!(grid.base_value, grid.cell(1, 1));
    assert!(grid.warnings.iter().any(|w| w.tag() == "data_insufficient"
        && w.message().contains("cell wacc 11.00% / growth inf% not computed")));
}

#[test]
fn test_default_assumptions_feed_valuation() {
    let engine = DcfEngine::new();
    let defaults = engine.compute_default_assumptions(&history());
    assert_relative_eq!(defaults.ebitda_margin, 20.0, epsilon = 1e-9);
    let valuation = engine.compute_valuation(&history(), &defaults).unwrap();
    assert!(valuation.intrinsic_value_per_share > 0.0);
}
