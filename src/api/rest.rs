// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Thin layer over the core: parse the query, call the gateway / assembler /
// statistics, and translate `StockError` into a status code:
//
//   NoData        -> 404
//   InvalidInput  -> 400
//   AuthFailure   -> 500
//   FetchFailure  -> 500
//
// Error bodies are `{ "error": "<message>" }`.  CORS is fully open because
// the dashboard is served from a different origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app_state::AppState;
use crate::error::StockError;
use crate::statistics;
use crate::types::prices;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // ── Stocks ──────────────────────────────────────────────────
        .route("/stocks", get(all_stocks))
        .route("/stocks/correlation", get(stock_correlation))
        .route("/stockcorrelation", get(stock_correlation))
        .route("/stocks/:ticker", get(stock_average))
        // ── Calculator ──────────────────────────────────────────────
        .route("/api/calculate-average", post(calculate_average))
        // ── Cache administration ────────────────────────────────────
        .route("/cache", delete(clear_cache))
        .route("/cache/:key", delete(invalidate_cache_key))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error translation
// =============================================================================

/// Message used for every 404 on price lookups.
const NO_DATA_MESSAGE: &str = "No price data found for the specified ticker and time range";

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::NoData(ref what) => {
                info!(tickers = %what, "no price data");
                Self {
                    status: StatusCode::NOT_FOUND,
                    message: NO_DATA_MESSAGE.to_string(),
                }
            }
            StockError::InvalidInput(message) => Self::bad_request(message),
            StockError::AuthFailure(_) | StockError::FetchFailure { .. } => {
                error!(error = %err, "upstream request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: err.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(json!({ "error": self.message }))).into_response()
    }
}

/// `minutes` absent or blank means "latest"; otherwise it must be a
/// non-negative integer.
fn parse_minutes(raw: Option<&str>) -> Result<Option<u32>, StockError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<u32>().map(Some).map_err(|_| {
            StockError::InvalidInput(format!("minutes must be a non-negative integer, got '{s}'"))
        }),
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    cache_entries: usize,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        cache_entries: state.gateway.cached_entries(),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Stocks
// =============================================================================

async fn all_stocks(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let stocks = state.gateway.all_stocks().await?;
    Ok(Json(json!({ "stocks": &*stocks })))
}

#[derive(Deserialize)]
struct AverageQuery {
    #[serde(default)]
    minutes: Option<String>,
    #[serde(default)]
    aggregation: Option<String>,
}

async fn stock_average(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<AverageQuery>,
) -> Result<Json<Value>, ApiError> {
    let minutes = parse_minutes(query.minutes.as_deref())?;

    match query.aggregation.as_deref() {
        None | Some("average") => {}
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "unsupported aggregation '{other}'; only 'average' is available"
            )))
        }
    }

    let history = state.gateway.price_history(&ticker, minutes).await?;
    if history.is_empty() {
        return Err(StockError::NoData(ticker).into());
    }

    let average = statistics::average(&prices(&history));
    Ok(Json(json!({
        "averageStockPrice": average,
        "priceHistory": &*history,
    })))
}

/// Query pairs are taken as a list because `ticker` repeats.
async fn stock_correlation(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let tickers: Vec<&str> = pairs
        .iter()
        .filter(|(k, _)| k == "ticker")
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if tickers.len() != 2 {
        return Err(ApiError::bad_request("Exactly two tickers are required"));
    }

    let minutes = parse_minutes(
        pairs
            .iter()
            .find(|(k, _)| k == "minutes")
            .map(|(_, v)| v.as_str()),
    )?;

    let result = state
        .correlator
        .correlate(tickers[0], tickers[1], minutes)
        .await?;

    let mut stocks = serde_json::Map::new();
    stocks.insert(
        result.ticker_a.clone(),
        json!({ "averagePrice": result.mean_a, "priceHistory": &*result.series_a }),
    );
    stocks.insert(
        result.ticker_b.clone(),
        json!({ "averagePrice": result.mean_b, "priceHistory": &*result.series_b }),
    );

    Ok(Json(json!({
        "correlation": result.coefficient,
        "stocks": stocks,
    })))
}

// =============================================================================
// Calculator
// =============================================================================

fn calculator_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

/// Unreadable bodies (missing, not JSON, wrong content type) get the same
/// JSON 400 as a body without `numbers`.
async fn calculate_average(body: Result<Json<Value>, JsonRejection>) -> Response {
    let Ok(Json(body)) = body else {
        return calculator_error("Please provide an array of numbers");
    };
    let Some(numbers) = body.get("numbers").and_then(Value::as_array) else {
        return calculator_error("Please provide an array of numbers");
    };
    if numbers.is_empty() {
        return calculator_error("Array cannot be empty");
    }

    let Some(values) = numbers.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>() else {
        return calculator_error("All elements must be numbers");
    };

    Json(json!({
        "success": true,
        "input": values,
        "average": statistics::average(&values),
    }))
    .into_response()
}

// =============================================================================
// Cache administration
// =============================================================================

async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.gateway.cached_entries();
    state.gateway.clear_cache();
    info!(entries, "cache cleared");
    Json(json!({ "cleared": entries }))
}

async fn invalidate_cache_key(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let removed = state.gateway.invalidate(&key);
    info!(key = %key, removed, "cache key invalidated");
    Json(json!({ "key": key, "removed": removed }))
}

// =============================================================================
// Tests
// =============================================================================
