//! Consensus aggregation across model results.

use chrono::Utc;
use valuation_core::stats;
use valuation_core::{
    ConsensusSummary, ModelKind, ModelResult, Recommendation, RecommendationConfig,
    ValuationError, ValuationWarning,
};

/// Dispersion statistics over a set of fair values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispersion {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub spread: f64,
    pub agreement_score: f64,
}

impl Dispersion {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = stats::mean(values);
        let spread = if mean.abs() < f64::EPSILON { 0.0 } else { (max - min) / mean.abs() };
        // Zero mean gives no usable CV, which counts as no agreement
        let agreement_score = stats::coefficient_of_variation(values)
            .map(|cv| (1.0 - cv).max(0.0))
            .unwrap_or(0.0);

        Some(Self {
            min,
            max,
            mean,
            median: stats::median(values),
            spread,
            agreement_score,
        })
    }
}

/// Recommendation from mean upside, softened when the models disagree or
/// carry little confidence.
pub fn recommend(
    upside_pct: Option<f64>,
    agreement_score: f64,
    mean_confidence: f64,
    config: &RecommendationConfig,
) -> Recommendation {
    let Some(upside) = upside_pct else {
        return Recommendation::Hold;
    };
    let raw = Recommendation::from_upside(upside, config.strong_threshold, config.moderate_threshold);
    if agreement_score < config.min_agreement_for_strong
        || mean_confidence < config.min_confidence_for_strong
    {
        raw.soften()
    } else {
        raw
    }
}

/// Build the summary from the models that succeeded.
pub fn build_consensus(
    ticker: &str,
    primary_model: ModelKind,
    model_results: Vec<ModelResult>,
    warnings: Vec<ValuationWarning>,
    current_price: Option<f64>,
    config: &RecommendationConfig,
) -> Result<ConsensusSummary, ValuationError> {
    let values: Vec<f64> = model_results.iter().map(|r| r.fair_value).collect();
    let dispersion = Dispersion::from_values(&values).ok_or_else(|| {
        ValuationError::NoModelsSucceeded(
            warnings
                .iter()
                .filter_map(|w| match w {
                    ValuationWarning::ModelUnavailable { model, .. } => Some(model.to_string()),
                    _ => None,
                })
                .collect(),
        )
    })?;

    let current_price = current_price.filter(|p| p.is_finite() && *p > 0.0);
    let upside_pct = current_price.map(|p| (dispersion.mean - p) / p * 100.0);
    let confidences: Vec<f64> = model_results.iter().map(|r| r.confidence).collect();
    let recommendation = recommend(
        upside_pct,
        dispersion.agreement_score,
        stats::mean(&confidences),
        config,
    );

    Ok(ConsensusSummary {
        ticker: ticker.to_string(),
        timestamp: Utc::now(),
        primary_model,
        model_results,
        min_value: dispersion.min,
        max_value: dispersion.max,
        mean_value: dispersion.mean,
        median_value: dispersion.median,
        spread: dispersion.spread,
        agreement_score: dispersion.agreement_score,
        current_price,
        upside_pct,
        recommendation,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::Value;

    fn result(kind: ModelKind, value: f64, confidence: f64) -> ModelResult {
        ModelResult {
            model_kind: kind,
            fair_value: value,
            confidence,
            assumptions_used: Value::Null,
            reasoning: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_dispersion() {
        let d = Dispersion::from_values(&[10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(d.min, 10.0);
        assert_relative_eq!(d.max, 30.0);
        assert_relative_eq!(d.mean, 20.0);
        assert_relative_eq!(d.median, 20.0);
        assert_relative_eq!(d.spread, 1.0);
        let cv = (200.0_f64 / 3.0).sqrt() / 20.0;
        assert_relative_eq!(d.agreement_score, 1.0 - cv, epsilon = 1e-12);
        assert!(Dispersion::from_values(&[]).is_none());
    }

    #[test]
    fn test_zero_mean_has_zero_spread() {
        let d = Dispersion::from_values(&[-5.0, 5.0]).unwrap();
        assert_relative_eq!(d.spread, 0.0);
        assert_relative_eq!(d.agreement_score, 0.0);
    }

    #[test]
    fn test_recommend_softens_on_disagreement() {
        let config = RecommendationConfig::default();
        assert_eq!(recommend(Some(30.0), 0.9, 0.8, &config), Recommendation::StrongBuy);
        assert_eq!(recommend(Some(30.0), 0.3, 0.8, &config), Recommendation::Buy);
        assert_eq!(recommend(Some(-30.0), 0.9, 0.4, &config), Recommendation::Sell);
        assert_eq!(recommend(None, 1.0, 1.0, &config), Recommendation::Hold);
    }

    #[test]
    fn test_build_consensus_upside() {
        let summary = build_consensus(
            "ACME",
            ModelKind::Dcf,
            vec![result(ModelKind::Dcf, 115.0, 0.8), result(ModelKind::Asset, 115.0, 0.6)],
            Vec::new(),
            Some(100.0),
            &RecommendationConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(summary.upside_pct.unwrap(), 15.0, epsilon = 1e-9);
        assert_eq!(summary.recommendation, Recommendation::Buy);
        assert_relative_eq!(summary.agreement_score, 1.0);
    }

    #[test]
    fn test_build_consensus_without_results_fails() {
        let err = build_consensus(
            "ACME",
            ModelKind::Dcf,
            Vec::new(),
            vec![ValuationWarning::model_unavailable(ModelKind::Ddm, "no dividend")],
            None,
            &RecommendationConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ValuationError::NoModelsSucceeded(vec!["DDM".to_string()]));
    }
}
