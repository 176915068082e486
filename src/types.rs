// =============================================================================
// Shared types used across the stock statistics service
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed price for a ticker, exactly as the upstream reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    #[serde(rename = "lastUpdatedAt", alias = "observedAt")]
    pub observed_at: DateTime<Utc>,
}

/// Ordered price series for one ticker. Upstream order is kept as is.
///
/// Shared behind an `Arc` so the cache and every reader see the same
/// allocation; a refresh replaces the whole series.
pub type PriceHistory = Arc<[PricePoint]>;

/// Upstream listing of tradable stocks (company name -> ticker/metadata).
pub type StockListing = Arc<serde_json::Map<String, serde_json::Value>>;

/// Extract the bare price column from a series.
pub fn prices(history: &[PricePoint]) -> Vec<f64> {
    history.iter().map(|p| p.price).collect()
}

/// Result bundle for a two-ticker correlation request.
#[derive(Debug, Clone)]
pub struct CorrelationResult {
    pub ticker_a: String,
    pub ticker_b: String,
    /// Pearson coefficient rounded to 4 decimals; 0 on degenerate input.
    pub coefficient: f64,
    /// Prefix of the first ticker's history, truncated to the shorter length.
    pub series_a: PriceHistory,
    /// Prefix of the second ticker's history, truncated to the shorter length.
    pub series_b: PriceHistory,
    pub mean_a: f64,
    pub mean_b: f64,
}
