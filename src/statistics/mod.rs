// =============================================================================
// Statistics Module
// =============================================================================
//
// Pure, side-effect-free numeric routines over price series.  Unlike the rest
// of the service these never fail: empty or degenerate input yields the 0
// sentinel, so callers treat 0 as "no data" rather than handling an error.

pub mod correlation;
pub mod moments;

pub use correlation::{correlation, round_to};
pub use moments::{average, covariance, standard_deviation};
