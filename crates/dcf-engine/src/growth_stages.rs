//! Growth Stage Scheduling
//!
//! Splits the projection horizon into stages whose growth rate fades from the
//! company's historical rate toward a long-run (GDP) target. Fade policies are
//! declarative [`StageTemplate`]s, so a new policy is a new template rather
//! than new projector code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use valuation_core::stats;
use valuation_core::{
    BlendMethod, GrowthMode, GrowthStage, StageConfidence, ValuationConfig, ValuationError,
    ValuationWarning,
};

/// One entry of a stage template. `years` is a nominal length that gets
/// rescaled to the actual horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub years: u32,
    pub gdp_weight: f64,
    pub confidence: StageConfidence,
}

impl StageSpec {
    pub const fn new(years: u32, gdp_weight: f64, confidence: StageConfidence) -> Self {
        Self { years, gdp_weight, confidence }
    }
}

/// Ordered list of (length, gdp weight) pairs. The weight never decreases and
/// the final stage is always fully faded (weight 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    specs: Vec<StageSpec>,
}

impl StageTemplate {
    pub fn new(specs: Vec<StageSpec>) -> Result<Self, ValuationError> {
        if specs.is_empty() {
            return Err(ValuationError::InvalidTemplate("template has no stages".to_string()));
        }
        for (idx, spec) in specs.iter().enumerate() {
            if spec.years == 0 {
                return Err(ValuationError::InvalidTemplate(format!(
                    "stage {} has zero length",
                    idx + 1
                )));
            }
            if !spec.gdp_weight.is_finite() || !(0.0..=1.0).contains(&spec.gdp_weight) {
                return Err(ValuationError::InvalidTemplate(format!(
                    "stage {} weight {} outside [0, 1]",
                    idx + 1,
                    spec.gdp_weight
                )));
            }
        }
        if specs.windows(2).any(|w| w[1].gdp_weight < w[0].gdp_weight) {
            return Err(ValuationError::InvalidTemplate(
                "gdp weights must be non-decreasing".to_string(),
            ));
        }
        if specs.last().map(|s| s.gdp_weight) != Some(1.0) {
            return Err(ValuationError::InvalidTemplate(
                "final stage must have gdp weight 1.0".to_string(),
            ));
        }
        Ok(Self { specs })
    }

    /// Three-stage rule-based fade over a nominal ten years.
    pub fn simple() -> Self {
        Self {
            specs: vec![
                StageSpec::new(3, 0.0, StageConfidence::High),
                StageSpec::new(4, 0.5, StageConfidence::Medium),
                StageSpec::new(3, 1.0, StageConfidence::Low),
            ],
        }
    }

    /// Four-stage guided fade over a nominal ten years.
    pub fn enhanced() -> Self {
        Self {
            specs: vec![
                StageSpec::new(2, 0.0, StageConfidence::High),
                StageSpec::new(3, 0.25, StageConfidence::High),
                StageSpec::new(3, 0.6, StageConfidence::Medium),
                StageSpec::new(2, 1.0, StageConfidence::Low),
            ],
        }
    }

    pub fn for_mode(mode: GrowthMode) -> Self {
        match mode {
            GrowthMode::Simple => Self::simple(),
            GrowthMode::Enhanced => Self::enhanced(),
        }
    }

    /// Rescale the template onto `[1, horizon]`.
    ///
    /// Boundaries follow the cumulative share of nominal years, every stage
    /// keeps at least one year and the last stage ends at `horizon`. When the
    /// horizon is shorter than the template, the earliest stages are dropped.
    pub fn partition(&self, horizon: u32) -> Vec<(u32, u32, &StageSpec)> {
        if horizon == 0 {
            return Vec::new();
        }
        let n = self.specs.len().min(horizon as usize);
        let specs = &self.specs[self.specs.len() - n..];
        let total: u32 = specs.iter().map(|s| s.years).sum();

        let mut out = Vec::with_capacity(n);
        let mut cumulative = 0u32;
        let mut prev_end = 0u32;
        for (k, spec) in specs.iter().enumerate() {
            cumulative += spec.years;
            let end = if k == n - 1 {
                horizon
            } else {
                let remaining = (n - 1 - k) as u32;
                let target =
                    ((cumulative as f64 / total as f64) * horizon as f64).round() as u32;
                target.max(prev_end + 1).min(horizon - remaining)
            };
            out.push((prev_end + 1, end, spec));
            prev_end = end;
        }
        out
    }
}

/// Inputs to the scheduler. Rates are percentages; `historical_rates` are
/// ordered most recent estimate first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthInputs {
    pub historical_rates: Vec<f64>,
    /// Number of historical observations the estimates were derived from
    pub data_points: usize,
    pub target_rate: f64,
    pub mode: GrowthMode,
    pub horizon: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSchedule {
    pub stages: Vec<GrowthStage>,
    pub historical_rate: f64,
    pub target_rate: f64,
    pub warnings: Vec<ValuationWarning>,
}

impl GrowthSchedule {
    /// Stage key to growth rate, e.g. `"stage_1" -> 10.0`.
    pub fn waterfall(&self) -> BTreeMap<String, f64> {
        self.stages
            .iter()
            .enumerate()
            .map(|(idx, s)| (format!("stage_{}", idx + 1), s.growth_rate))
            .collect()
    }

    pub fn is_fallback(&self) -> bool {
        self.stages.iter().any(|s| s.method == BlendMethod::ConservativeFlat)
    }
}

pub struct GrowthStageScheduler<'a> {
    config: &'a ValuationConfig,
}

impl<'a> GrowthStageScheduler<'a> {
    pub fn new(config: &'a ValuationConfig) -> Self {
        Self { config }
    }

    /// Schedule using the built-in template for `inputs.mode`.
    pub fn schedule(&self, inputs: &GrowthInputs) -> Result<GrowthSchedule, ValuationError> {
        self.schedule_with_template(inputs, &StageTemplate::for_mode(inputs.mode))
    }

    pub fn schedule_with_template(
        &self,
        inputs: &GrowthInputs,
        template: &StageTemplate,
    ) -> Result<GrowthSchedule, ValuationError> {
        if inputs.horizon == 0 {
            return Err(ValuationError::InvalidInput(
                "projection horizon must be at least one year".to_string(),
            ));
        }
        if !inputs.target_rate.is_finite() {
            return Err(ValuationError::InvalidInput(format!(
                "long-run target rate is not finite: {}",
                inputs.target_rate
            )));
        }

        let target = self.config.clamp_growth(inputs.target_rate);
        let estimates: Vec<f64> = inputs
            .historical_rates
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .collect();

        if inputs.data_points < self.config.min_data_points || estimates.is_empty() {
            return Ok(self.flat_schedule(inputs, target));
        }

        let raw_historical = match inputs.mode {
            GrowthMode::Simple => stats::mean(&estimates),
            GrowthMode::Enhanced => {
                let n = estimates.len();
                let weights: Vec<f64> = (0..n).map(|i| (n - i) as f64).collect();
                stats::weighted_mean(&estimates, &weights)
            }
        };
        let historical = self.config.clamp_growth(raw_historical);
        let dispersed = inputs.mode == GrowthMode::Enhanced
            && stats::std_dev(&estimates) > self.config.growth_dispersion_threshold;

        let stages = template
            .partition(inputs.horizon)
            .into_iter()
            .map(|(start_year, end_year, spec)| {
                let w = spec.gdp_weight;
                let growth_rate = if w >= 1.0 {
                    target
                } else {
                    self.config.clamp_growth(historical * (1.0 - w) + target * w)
                };
                let confidence = if dispersed {
                    spec.confidence.downgrade()
                } else {
                    spec.confidence
                };
                let mut stage = GrowthStage {
                    start_year,
                    end_year,
                    growth_rate,
                    method: BlendMethod::from_weight(w),
                    gdp_weight: w,
                    confidence,
                    rationale: String::new(),
                };
                stage.rationale = format!(
                    "{}: {:.0}% company history ({:.2}%), {:.0}% long-run ({:.2}%)",
                    stage.label(),
                    (1.0 - w) * 100.0,
                    historical,
                    w * 100.0,
                    target
                );
                stage
            })
            .collect();

        tracing::debug!(
            historical,
            target,
            mode = ?inputs.mode,
            horizon = inputs.horizon,
            "Scheduled growth stages"
        );

        Ok(GrowthSchedule {
            stages,
            historical_rate: historical,
            target_rate: target,
            warnings: Vec::new(),
        })
    }

    fn flat_schedule(&self, inputs: &GrowthInputs, target: f64) -> GrowthSchedule {
        let reason = format!(
            "Insufficient growth history ({} data points, need {}); using flat long-run rate {:.2}%",
            inputs.data_points, self.config.min_data_points, target
        );
        let stage = GrowthStage {
            start_year: 1,
            end_year: inputs.horizon,
            growth_rate: target,
            method: BlendMethod::ConservativeFlat,
            gdp_weight: 1.0,
            confidence: StageConfidence::Low,
            rationale: reason.clone(),
        };
        GrowthSchedule {
            stages: vec![stage],
            historical_rate: target,
            target_rate: target,
            warnings: vec![ValuationWarning::data_insufficient(reason)],
        }
    }
}
