// =============================================================================
// Correlation Assembler — pairs two price histories and scores them
// =============================================================================
//
// Alignment is a plain prefix truncation: both series are cut to the length
// of the shorter one, keeping indices [0, min_len).  This assumes both series
// start at the same time and are sampled on the same grid.  When they are not,
// points are paired by position rather than by timestamp and the coefficient
// describes that pairing.  No interpolation is attempted.
// =============================================================================

use std::sync::Arc;

use futures_util::future::try_join;
use tracing::{debug, instrument};

use crate::error::{StockError, StockResult};
use crate::gateway::StockDataGateway;
use crate::statistics::{average, correlation, round_to};
use crate::types::{prices, CorrelationResult, PriceHistory};

/// Decimal places kept in the published coefficient.
const COEFFICIENT_DECIMALS: u32 = 4;

pub struct CorrelationAssembler {
    gateway: Arc<StockDataGateway>,
}

impl CorrelationAssembler {
    pub fn new(gateway: Arc<StockDataGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch both histories (concurrently, cache-backed) and correlate them.
    #[instrument(skip(self), name = "correlation::correlate")]
    pub async fn correlate(
        &self,
        ticker_a: &str,
        ticker_b: &str,
        minutes: Option<u32>,
    ) -> StockResult<CorrelationResult> {
        let (history_a, history_b) = try_join(
            self.gateway.price_history(ticker_a, minutes),
            self.gateway.price_history(ticker_b, minutes),
        )
        .await?;

        assemble(ticker_a, &history_a, ticker_b, &history_b)
    }
}

/// Align two histories by prefix truncation and compute means and the
/// rounded Pearson coefficient over the aligned pair.
pub fn assemble(
    ticker_a: &str,
    history_a: &PriceHistory,
    ticker_b: &str,
    history_b: &PriceHistory,
) -> StockResult<CorrelationResult> {
    let empty: Vec<&str> = [(ticker_a, history_a), (ticker_b, history_b)]
        .into_iter()
        .filter(|(_, h)| h.is_empty())
        .map(|(t, _)| t)
        .collect();
    if !empty.is_empty() {
        return Err(StockError::NoData(empty.join(", ")));
    }

    let len = history_a.len().min(history_b.len());
    if history_a.len() != history_b.len() {
        debug!(
            ticker_a,
            ticker_b,
            len_a = history_a.len(),
            len_b = history_b.len(),
            aligned = len,
            "truncating price histories to the shorter length"
        );
    }

    let series_a: PriceHistory = Arc::from(&history_a[..len]);
    let series_b: PriceHistory = Arc::from(&history_b[..len]);

    let xs = prices(&series_a);
    let ys = prices(&series_b);

    Ok(CorrelationResult {
        ticker_a: ticker_a.to_string(),
        ticker_b: ticker_b.to_string(),
        coefficient: round_to(correlation(&xs, &ys), COEFFICIENT_DECIMALS),
        mean_a: average(&xs),
        mean_b: average(&ys),
        series_a,
        series_b,
    })
}
