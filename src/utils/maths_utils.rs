use statrs::statistics::Statistics;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Exponential normalization. The max is subtracted first so equal or large
/// scores still produce finite probabilities.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max_score).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

/// Pearson correlation of two equal-length samples.
/// A zero-variance side has no defined correlation and reports 0.0.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let covariance = x.iter().population_covariance(y.iter());
    let denominator = x.iter().population_std_dev() * y.iter().population_std_dev();
    if denominator <= 0.0 || !denominator.is_finite() || !covariance.is_finite() {
        return 0.0;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// 95% Wilson score interval for a binomial proportion.
pub fn wilson_interval(successes: usize, total: usize) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }

    let z = 1.96_f64;
    let n = total as f64;
    let p = successes as f64 / n;

    let denominator = 1.0 + (z * z / n);
    let center = (p + (z * z) / (2.0 * n)) / denominator;
    let margin = (z * ((p * (1.0 - p) / n) + (z * z) / (4.0 * n * n)).sqrt()) / denominator;

    (center - margin, center + margin)
}
