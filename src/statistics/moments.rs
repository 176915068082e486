// =============================================================================
// Moments — mean, standard deviation, covariance
// =============================================================================
//
// The two dispersion measures use different divisors:
//
//   standard_deviation  = sqrt( Σ(x - mean)² / n )          (population)
//   covariance          = Σ(x - mean_x)(y - mean_y) / (n-1)  (sample)
//
// Existing consumers depend on both values as they are.  Whether to unify on
// n or n-1 is still an open decision; `divisor_conventions_differ` below pins
// the current behaviour.  `correlation::correlation` rescales before mixing.
// =============================================================================

/// Arithmetic mean of `values`.
///
/// Returns `0.0` for an empty slice. That is a "no data" sentinel, not a true
/// zero mean.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
///
/// Pass `mean` when it is already known to skip a pass over the data.
/// Returns `0.0` when fewer than two values are given.
pub fn standard_deviation(values: &[f64], mean: Option<f64>) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = mean.unwrap_or_else(|| average(values));
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / n as f64).sqrt()
}

/// Sample covariance (divides by `n - 1`).
///
/// Returns `0.0` if the slices differ in length, either is empty, or there
/// are fewer than two pairs.
pub fn covariance(xs: &[f64], ys: &[f64], mean_x: Option<f64>, mean_y: Option<f64>) -> f64 {
    let n = xs.len();
    if n != ys.len() || n < 2 {
        return 0.0;
    }
    let mean_x = mean_x.unwrap_or_else(|| average(xs));
    let mean_y = mean_y.unwrap_or_else(|| average(ys));
    let sum: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    sum / (n - 1) as f64
}
