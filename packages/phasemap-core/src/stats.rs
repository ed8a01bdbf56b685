//! Scalar surface statistics. All reductions ignore non-finite samples;
//! a grid with no finite samples yields NaN rather than an error.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Peak-to-valley: max minus min of the finite samples.
pub fn pv(data: &Array2<f64>) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in data.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if max >= min {
        max - min
    } else {
        f64::NAN
    }
}

/// Root-mean-square of the finite samples.
pub fn rms(data: &Array2<f64>) -> f64 {
    let mut sum_sq = 0.0;
    let mut n = 0usize;
    for &v in data.iter().filter(|v| v.is_finite()) {
        sum_sq += v * v;
        n += 1;
    }
    if n > 0 {
        (sum_sq / n as f64).sqrt()
    } else {
        f64::NAN
    }
}

/// Ra: mean absolute deviation of the finite samples from their mean.
pub fn ra(data: &Array2<f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in data.iter().filter(|v| v.is_finite()) {
        sum += v;
        n += 1;
    }
    if n == 0 {
        return f64::NAN;
    }
    let mean = sum / n as f64;
    let abs_dev: f64 = data
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| (v - mean).abs())
        .sum();
    abs_dev / n as f64
}

/// Percentage of non-finite samples relative to the total element count.
pub fn dropout_percentage(data: &Array2<f64>) -> f64 {
    let dropped = data.iter().filter(|v| !v.is_finite()).count();
    dropped as f64 / data.len() as f64 * 100.0
}

/// Scalar quality metrics for a single phase map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceStatistics {
    pub pv: f64,
    pub rms: f64,
    pub ra: f64,
    pub dropout_percentage: f64,
}

/// Computes all scalar statistics for a grid in one pass over the API.
pub fn summarize(data: &Array2<f64>) -> SurfaceStatistics {
    SurfaceStatistics {
        pv: pv(data),
        rms: rms(data),
        ra: ra(data),
        dropout_percentage: dropout_percentage(data),
    }
}
