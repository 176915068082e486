// In-process stand-in for the upstream stock API, used by async tests.
//
// Serves the same three endpoints on 127.0.0.1:<ephemeral> and counts calls
// per endpoint so tests can assert on cache hits and token reuse.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::Credentials;
use crate::gateway::{CachePolicy, StockDataGateway};
use crate::ttl_cache::TtlCache;
use crate::upstream::client::UpstreamClient;
use crate::upstream::token::{TokenAuthenticator, DEFAULT_REFRESH_MARGIN_SECS};

#[derive(Default)]
pub struct CallCounts {
    auth: AtomicUsize,
    listing: AtomicUsize,
    prices: AtomicUsize,
}

impl CallCounts {
    pub fn auth(&self) -> usize {
        self.auth.load(Ordering::SeqCst)
    }

    pub fn listing(&self) -> usize {
        self.listing.load(Ordering::SeqCst)
    }

    pub fn prices(&self) -> usize {
        self.prices.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockConfig {
    /// Lifetime of issued tokens; sent as an absolute epoch like the real API.
    pub token_lifetime_secs: i64,
    pub prices: HashMap<String, Vec<f64>>,
    pub reject_auth: bool,
    pub fail_prices: bool,
    /// Failures are served as a plain-text 502 page instead of a JSON 500.
    pub plain_error_pages: bool,
    pub price_delay: Option<Duration>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            token_lifetime_secs: 3600,
            prices: HashMap::new(),
            reject_auth: false,
            fail_prices: false,
            plain_error_pages: false,
            price_delay: None,
        }
    }
}

impl MockConfig {
    pub fn with_prices(mut self, ticker: &str, prices: &[f64]) -> Self {
        self.prices.insert(ticker.to_string(), prices.to_vec());
        self
    }
}

pub struct MockUpstream {
    pub base_url: String,
    pub calls: Arc<CallCounts>,
}

impl MockUpstream {
    pub fn client(&self) -> UpstreamClient {
        UpstreamClient::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }

    pub fn gateway(&self) -> StockDataGateway {
        self.gateway_with(CachePolicy::default())
    }

    pub fn gateway_with(&self, policy: CachePolicy) -> StockDataGateway {
        let client = Arc::new(self.client());
        let auth = Arc::new(TokenAuthenticator::new(
            client.clone(),
            credentials(),
            DEFAULT_REFRESH_MARGIN_SECS,
        ));
        StockDataGateway::new(client, auth, Arc::new(TtlCache::new()), policy)
    }
}

struct MockState {
    config: MockConfig,
    calls: Arc<CallCounts>,
}

pub fn credentials() -> Credentials {
    Credentials::from_lookup(|key| Some(format!("test-{}", key.to_lowercase()))).unwrap()
}

/// Timestamp of the `i`-th generated point (one per minute).
pub fn point_time(i: usize) -> DateTime<Utc> {
    let base: DateTime<Utc> = "2025-05-08T04:00:00Z".parse().unwrap();
    base + chrono::Duration::minutes(i as i64)
}

pub async fn spawn(config: MockConfig) -> MockUpstream {
    let calls = Arc::new(CallCounts::default());
    let state = Arc::new(MockState {
        config,
        calls: calls.clone(),
    });

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/stocks", get(listing))
        .route("/stocks/:ticker", get(prices))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base_url: format!("http://{addr}"),
        calls,
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer token-"))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "invalid token" }))).into_response()
}

async fn auth(State(state): State<Arc<MockState>>, Json(body): Json<serde_json::Value>) -> Response {
    let n = state.calls.auth.fetch_add(1, Ordering::SeqCst) + 1;

    if state.config.reject_auth || body.get("clientSecret").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid credentials" })),
        )
            .into_response();
    }

    Json(json!({
        "token_type": "Bearer",
        "access_token": format!("token-{n}"),
        "expires_in": Utc::now().timestamp() + state.config.token_lifetime_secs,
    }))
    .into_response()
}

async fn listing(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.calls.listing.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "stocks": {
            "Apple Inc.": "AAPL",
            "Microsoft Corporation": "MSFT",
            "NVIDIA Corporation": "NVDA",
        }
    }))
    .into_response()
}

async fn prices(
    State(state): State<Arc<MockState>>,
    Path(ticker): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.calls.prices.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    if let Some(delay) = state.config.price_delay {
        tokio::time::sleep(delay).await;
    }
    if state.config.fail_prices && state.config.plain_error_pages {
        return (StatusCode::BAD_GATEWAY, "<html><body>502 Bad Gateway</body></html>").into_response();
    }
    if state.config.fail_prices {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "upstream exploded" })),
        )
            .into_response();
    }

    let series = state.config.prices.get(&ticker).cloned().unwrap_or_default();
    let points: Vec<serde_json::Value> = series
        .iter()
        .enumerate()
        .map(|(i, p)| json!({ "price": p, "lastUpdatedAt": point_time(i).to_rfc3339() }))
        .collect();

    if query.contains_key("minutes") {
        Json(json!(points)).into_response()
    } else {
        match points.last() {
            Some(last) => Json(json!({ "stock": last })).into_response(),
            None => Json(json!({})).into_response(),
        }
    }
}
