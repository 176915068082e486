// =============================================================================
// Pearson Correlation
// =============================================================================
//
//   r = cov(x, y) / (σx · σy)
//
// `covariance` is a sample estimate (n-1) while `standard_deviation` is a
// population estimate (n).  Dividing one by the other directly inflates |r|
// by n/(n-1) and can leave [-1, 1] (three perfectly anti-correlated points
// would give -1.5).  The covariance is therefore rescaled onto the n divisor
// before the ratio is taken.
// =============================================================================

use super::{average, covariance, standard_deviation};

/// Pearson correlation coefficient of two equally long series.
///
/// Returns `0.0` when the lengths differ, fewer than two pairs are given, or
/// either series is constant (zero standard deviation).
pub fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n != ys.len() || n < 2 {
        return 0.0;
    }

    let mean_x = average(xs);
    let mean_y = average(ys);

    let sd_x = standard_deviation(xs, Some(mean_x));
    let sd_y = standard_deviation(ys, Some(mean_y));
    if sd_x == 0.0 || sd_y == 0.0 {
        return 0.0;
    }

    let n = n as f64;
    let cov = covariance(xs, ys, Some(mean_x), Some(mean_y)) * (n - 1.0) / n;

    let r = cov / (sd_x * sd_y);
    if !r.is_finite() {
        return 0.0;
    }
    r.clamp(-1.0, 1.0)
}

/// Round `value` to `decimals` places for presentation.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}
