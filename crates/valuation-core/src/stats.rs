//! Small statistics helpers shared by the growth scheduler and consensus
//! aggregation.
use statrs::statistics::{Data, Median, Statistics};

/// Compute the mean of a data slice. Returns 0.0 for empty input.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().mean()
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    data.iter().std_dev()
}

/// Population standard deviation (divides by n).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    data.iter().population_std_dev()
}

/// Median of a data slice. Returns 0.0 for empty input.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    Data::new(data.to_vec()).median()
}

/// Population coefficient of variation. Returns `None` when the mean is zero.
pub fn coefficient_of_variation(data: &[f64]) -> Option<f64> {
    let m = mean(data);
    if m.abs() < f64::EPSILON {
        return None;
    }
    Some(population_std_dev(data) / m.abs())
}

/// Weighted mean; weights that sum to zero yield the plain mean.
pub fn weighted_mean(data: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().take(data.len()).sum();
    if total.abs() < f64::EPSILON {
        return mean(data);
    }
    data.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / total
}

/// Compound annual growth rate in percent between `start` and `end` over
/// `periods` years. `None` if either endpoint is non-positive.
pub fn cagr(start: f64, end: f64, periods: usize) -> Option<f64> {
    if periods == 0 || start <= 0.0 || end <= 0.0 || !start.is_finite() || !end.is_finite() {
        return None;
    }
    Some(((end / start).powf(1.0 / periods as f64) - 1.0) * 100.0)
}

/// CAGR over a most-recent-first series using the oldest `span + 1` points.
pub fn cagr_most_recent_first(series: &[f64], span: usize) -> Option<f64> {
    if span == 0 || series.len() <= span {
        return None;
    }
    cagr(series[span], series[0], span)
}
