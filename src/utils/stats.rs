//! Statistical utility functions.

use statrs::distribution::{ContinuousCDF, Normal};

/// Euler–Mascheroni constant, used to approximate harmonic numbers.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

/// Calculate the standard deviation of a slice.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Probability mass beyond `±threshold` under a standard normal, as a percentage.
///
/// This is the share of rows a z-score threshold would flag on perfectly
/// Gaussian data.
///
/// # Example
/// ```
/// use outlier_consensus::utils::normal_tail_percentage;
///
/// // ~0.27% of normal data lies outside ±3σ
/// let pct = normal_tail_percentage(3.0);
/// assert!((pct - 0.27).abs() < 0.01);
/// ```
pub fn normal_tail_percentage(threshold: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 200.0 * (1.0 - normal.cdf(threshold.abs())),
        Err(_) => f64::NAN,
    }
}

/// Approximate harmonic number `H(i) = 1 + 1/2 + ... + 1/i`.
pub fn harmonic_number(i: f64) -> f64 {
    i.ln() + EULER_GAMMA
}

/// Average path length of an unsuccessful binary-search-tree lookup over `n` points.
///
/// Normalises isolation-tree depths: `c(n) = 2H(n-1) - 2(n-1)/n`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * harmonic_number(n - 1.0) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Euclidean distance between two observations of equal dimension.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
