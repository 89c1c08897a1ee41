//! Descriptive statistics over hour distributions.
//!
//! Everything here is a pure function over slices. Empty input yields `None`
//! rather than a numeric placeholder.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::LorenzPoint;

// ── Percentiles ───────────────────────────────────────────────────────────────

/// How a percentile falls between two order statistics.
///
/// The names follow NumPy's `percentile(method=...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PercentileMethod {
    /// Linear interpolation between the neighbouring order statistics.
    #[default]
    Linear,
    /// The lower neighbour.
    Lower,
    /// The higher neighbour.
    Higher,
    /// The closer neighbour; exact halves go to the higher one.
    Nearest,
    /// The mean of both neighbours.
    Midpoint,
}

/// Compute the `p`-th percentile (`0..=100`) of a **sorted** slice.
///
/// Returns `None` for an empty slice. A single sample is every percentile.
pub fn percentile(sorted_data: &[f64], p: f64, method: PercentileMethod) -> Option<f64> {
    let len = sorted_data.len();
    if len == 0 {
        return None;
    }
    if len == 1 {
        return Some(sorted_data[0]);
    }
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let (low, high) = (sorted_data[lo], sorted_data[hi]);
    if lo == hi {
        return Some(low);
    }
    let frac = rank - lo as f64;
    let value = match method {
        PercentileMethod::Linear => low + frac * (high - low),
        PercentileMethod::Lower => low,
        PercentileMethod::Higher => high,
        PercentileMethod::Nearest => {
            if frac < 0.5 {
                low
            } else {
                high
            }
        }
        PercentileMethod::Midpoint => (low + high) / 2.0,
    };
    Some(value)
}

/// Median of a **sorted** slice under linear interpolation.
pub fn median(sorted_data: &[f64]) -> Option<f64> {
    percentile(sorted_data, 50.0, PercentileMethod::Linear)
}

// ── Moments ───────────────────────────────────────────────────────────────────

/// Arithmetic mean; `None` when empty or when the sum overflows.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    m.is_finite().then_some(m)
}

/// Sample standard deviation (`n - 1` denominator). Needs two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    let std = (ss / (values.len() as f64 - 1.0)).sqrt();
    std.is_finite().then_some(std)
}

// ── Ratios ────────────────────────────────────────────────────────────────────

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// `numerator / denominator`, or `None` when the denominator is zero.
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

// ── Inequality ────────────────────────────────────────────────────────────────

/// Return an ascending copy of `values`.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Gini coefficient via the rank-weighted sum.
///
/// For ascending `x₁..xₙ`: `(n + 1 − 2·Σ(n−i+1)·xᵢ / Σxᵢ) / n`.
/// Values must be non-negative. All-zero input is perfectly equal (`0.0`);
/// empty input, or a total too large to represent, is undefined.
pub fn gini(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let total: f64 = sorted.iter().sum();
    if !total.is_finite() {
        return None;
    }
    if total == 0.0 {
        return Some(0.0);
    }
    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (n - i as f64) * (x / total))
        .sum();
    Some((n + 1.0 - 2.0 * weighted) / n)
}

/// Lorenz curve of `values`: cumulative population share against cumulative
/// value share, ascending by value, starting at the origin.
///
/// Empty input, or a total too large to represent, yields an empty curve.
/// When every value is zero the value share stays at zero.
pub fn lorenz_curve(values: &[f64]) -> Vec<LorenzPoint> {
    if values.is_empty() {
        return Vec::new();
    }
    let sorted = sorted_copy(values);
    let total: f64 = sorted.iter().sum();
    if !total.is_finite() {
        return Vec::new();
    }
    let n = sorted.len() as f64;

    let mut points = Vec::with_capacity(sorted.len() + 1);
    points.push(LorenzPoint {
        population_share: 0.0,
        value_share: 0.0,
    });
    let mut cumulative = 0.0;
    for (i, x) in sorted.iter().enumerate() {
        cumulative += x;
        points.push(LorenzPoint {
            population_share: (i + 1) as f64 / n,
            value_share: ratio_or_zero(cumulative, total),
        });
    }
    points
}

/// Gini coefficient as `1 − 2·(area under the Lorenz curve)`.
///
/// Agrees with [`gini`] on the same input.
pub fn gini_from_lorenz(curve: &[LorenzPoint]) -> Option<f64> {
    if curve.len() < 2 {
        return None;
    }
    if curve.last().map(|p| p.value_share) == Some(0.0) {
        return Some(0.0);
    }
    let area: f64 = curve
        .windows(2)
        .map(|w| {
            let width = w[1].population_share - w[0].population_share;
            width * (w[0].value_share + w[1].value_share) / 2.0
        })
        .sum();
    Some(1.0 - 2.0 * area)
}

// ── Ranks ─────────────────────────────────────────────────────────────────────

/// Fractional rank of every value among `values`, in input order.
///
/// Ranks are 1-based with ties sharing their average rank, then divided by
/// `n`, so the largest value maps to `1.0`.
pub fn rank_percentiles(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]].total_cmp(&values[order[start]]) == Ordering::Equal
        {
            end += 1;
        }
        // Positions start..=end hold 1-based ranks start+1..=end+1.
        let average = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = average / n as f64;
        }
        start = end + 1;
    }
    ranks
}

// ── Tests ──────────────────────────────────────────────────────────────────────
