// =============================================================================
// Core error taxonomy
// =============================================================================
//
// Internals of the upstream client work with `anyhow`; everything that leaves
// the token/gateway/correlation layer is one of these tagged variants so the
// HTTP layer can tell "not found" apart from "server error".

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StockError {
    /// Credential exchange with the upstream identity endpoint failed.
    #[error("failed to get authorization token: {0}")]
    AuthFailure(String),

    /// Upstream data call failed (auth, transport, non-2xx, malformed body).
    #[error("{context}: {reason}")]
    FetchFailure { context: String, reason: String },

    /// Well-formed request, but the upstream had no usable points.
    #[error("no price data found for {0}")]
    NoData(String),

    /// Caller-level problem detected before the core was invoked.
    #[error("{0}")]
    InvalidInput(String),
}

impl StockError {
    pub fn fetch(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::FetchFailure {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

pub type StockResult<T> = Result<T, StockError>;
