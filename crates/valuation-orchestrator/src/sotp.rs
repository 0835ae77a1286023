//! Sum-of-the-Parts
//!
//! Values each business segment on an EV/EBITDA multiple and applies a
//! conglomerate discount when more than one segment contributes.

use serde::{Deserialize, Serialize};
use valuation_core::{ModelConfig, ValuationError, ValuationWarning, WarningSink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub ebitda: f64,
    pub ev_multiple: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentValue {
    pub name: String,
    pub enterprise_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotpValuation {
    pub segments: Vec<SegmentValue>,
    pub gross_enterprise_value: f64,
    /// Amount deducted from the gross value, not the rate
    pub conglomerate_discount: f64,
    pub enterprise_value: f64,
    pub net_debt: f64,
    pub equity_value: f64,
    pub value_per_share: f64,
    pub warnings: Vec<ValuationWarning>,
}

pub fn compute_sotp(
    segments: &[Segment],
    net_debt: f64,
    shares: f64,
    config: &ModelConfig,
) -> Result<SotpValuation, ValuationError> {
    if !(shares.is_finite() && shares > 0.0) {
        return Err(ValuationError::InvalidInput(format!(
            "shares outstanding must be positive, got {}",
            shares
        )));
    }

    let mut warnings = WarningSink::new();
    let mut values = Vec::with_capacity(segments.len());
    for segment in segments {
        let usable = segment.ebitda.is_finite()
            && segment.ebitda > 0.0
            && segment.ev_multiple.is_finite()
            && segment.ev_multiple > 0.0;
        if !usable {
            warnings.push(ValuationWarning::data_insufficient(format!(
                "segment '{}' skipped: EBITDA {} x multiple {}",
                segment.name, segment.ebitda, segment.ev_multiple
            )));
            continue;
        }
        values.push(SegmentValue {
            name: segment.name.clone(),
            enterprise_value: segment.ebitda * segment.ev_multiple,
        });
    }

    if values.is_empty() {
        return Err(ValuationError::InvalidInput("no segment with positive EBITDA and multiple".into()));
    }

    let gross: f64 = values.iter().map(|v| v.enterprise_value).sum();
    let discount = if values.len() >= 2 {
        gross * config.conglomerate_discount
    } else {
        0.0
    };
    let enterprise_value = gross - discount;
    let net_debt = if net_debt.is_finite() { net_debt } else { 0.0 };
    let equity_value = enterprise_value - net_debt;

    tracing::debug!(
        segments = values.len(),
        gross,
        discount,
        "Computed sum-of-the-parts"
    );

    Ok(SotpValuation {
        segments: values,
        gross_enterprise_value: gross,
        conglomerate_discount: discount,
        enterprise_value,
        net_debt,
        equity_value,
        value_per_share: equity_value / shares,
        warnings: warnings.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn segment(name: &str, ebitda: f64, multiple: f64) -> Segment {
        Segment {
            name: name.to_string(),
            ebitda,
            ev_multiple: multiple,
        }
    }

    #[test]
    fn test_two_segments_get_conglomerate_discount() {
        let result = compute_sotp(
            &[segment("retail", 100.0, 8.0), segment("logistics", 50.0, 12.0)],
            200.0,
            100.0,
            &ModelConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(result.gross_enterprise_value, 1400.0);
        assert_relative_eq!(result.conglomerate_discount, 210.0, epsilon = 1e-9);
        assert_relative_eq!(result.equity_value, 990.0, epsilon = 1e-9);
        assert_relative_eq!(result.value_per_share, 9.9, epsilon = 1e-9);
    }

    #[test]
    fn test_single_segment_no_discount() {
        let result = compute_sotp(&[segment("core", 100.0, 10.0)], 0.0, 10.0, &ModelConfig::default()).unwrap();
        assert_relative_eq!(result.conglomerate_discount, 0.0);
        assert_relative_eq!(result.value_per_share, 100.0);
    }

    #[test]
    fn test_invalid_segments_skipped_with_warning() {
        let result = compute_sotp(
            &[segment("core", 100.0, 10.0), segment("startup", -20.0, 15.0)],
            0.0,
            10.0,
            &ModelConfig::default(),
        )
        .unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert_relative_eq!(result.conglomerate_discount, 0.0);
    }

    #[test]
    fn test_no_usable_segments_is_error() {
        assert!(compute_sotp(&[segment("x", 0.0, 5.0)], 0.0, 10.0, &ModelConfig::default()).is_err());
        assert!(compute_sotp(&[segment("x", 10.0, 5.0)], 0.0, 0.0, &ModelConfig::default()).is_err());
    }
}
