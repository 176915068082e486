// =============================================================================
// Stock Data Gateway — cache-fronted access to the upstream stock API
// =============================================================================
//
// Cache keys:
//   "all_stocks"                       listing                 TTL 10 min
//   "stock_<ticker>_<minutes>"         windowed price history  TTL 60 s
//   "stock_<ticker>_latest"            latest quote            TTL 20 s
//
// On a miss the gateway obtains a bearer token, calls the upstream, stores the
// result and returns it.  Any auth or transport problem surfaces as
// `FetchFailure`; nothing is retried and stale data is never served past its
// TTL.  An empty price history is a valid, cached result.
//
// Concurrent misses for the same key are coalesced: each key has an async gate
// and the cache is re-checked once the gate is held, so a burst produces one
// upstream call.  A failed fetch leaves the key empty and the next waiter
// tries again.  A gate lives only while a request for its key is waiting or
// fetching, so the gate map stays as small as the set of in-flight keys.
// =============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{StockError, StockResult};
use crate::ttl_cache::TtlCache;
use crate::types::{PriceHistory, StockListing};
use crate::upstream::{TokenAuthenticator, UpstreamClient};

pub const ALL_STOCKS_KEY: &str = "all_stocks";

/// Everything the gateway keeps in its cache.
#[derive(Debug, Clone)]
pub enum CachedResponse {
    Listing(StockListing),
    Prices(PriceHistory),
}

/// Per-call-site TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub listing_ttl: Duration,
    pub window_ttl: Duration,
    pub latest_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            listing_ttl: Duration::from_secs(10 * 60),
            window_ttl: Duration::from_secs(60),
            latest_ttl: Duration::from_secs(20),
        }
    }
}

impl CachePolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            listing_ttl: Duration::from_secs(config.listing_ttl_secs),
            window_ttl: Duration::from_secs(config.window_ttl_secs),
            latest_ttl: Duration::from_secs(config.latest_ttl_secs),
        }
    }

    /// Latest quotes are a single point that moves quickly, so they expire
    /// sooner than windowed histories.
    pub fn price_ttl(&self, minutes: Option<u32>) -> Duration {
        match minutes {
            Some(_) => self.window_ttl,
            None => self.latest_ttl,
        }
    }
}

/// Cache key for a price-history request.
pub fn price_cache_key(ticker: &str, minutes: Option<u32>) -> String {
    match minutes {
        Some(m) => format!("stock_{ticker}_{m}"),
        None => format!("stock_{ticker}_latest"),
    }
}

/// A zero-minute window means "latest only".
fn effective_window(minutes: Option<u32>) -> Option<u32> {
    minutes.filter(|&m| m > 0)
}

pub struct StockDataGateway {
    upstream: Arc<UpstreamClient>,
    auth: Arc<TokenAuthenticator>,
    cache: Arc<TtlCache<CachedResponse>>,
    policy: CachePolicy,
    // Gates exist only while some request for the key is in flight.
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds a key's gate for the duration of one miss. The last holder removes
/// the gate from the map on drop, including when the request is cancelled.
struct GateLease<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: &'a str,
    gate: Option<Arc<AsyncMutex<()>>>,
}

impl GateLease<'_> {
    async fn acquire(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        // Clones are only made and dropped under this lock, so the count is
        // exact: 1 means the map holds the sole reference.
        let mut gates = self.in_flight.lock();
        drop(self.gate.take());
        if gates.get(self.key).is_some_and(|g| Arc::strong_count(g) == 1) {
            gates.remove(self.key);
        }
    }
}

impl StockDataGateway {
    pub fn new(
        upstream: Arc<UpstreamClient>,
        auth: Arc<TokenAuthenticator>,
        cache: Arc<TtlCache<CachedResponse>>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            upstream,
            auth,
            cache,
            policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Listing of all stocks offered by the upstream.
    #[instrument(skip(self), name = "gateway::all_stocks")]
    pub async fn all_stocks(&self) -> StockResult<StockListing> {
        let cached = self
            .cached_or_fetch(ALL_STOCKS_KEY, self.policy.listing_ttl, self.fetch_listing())
            .await?;

        match cached {
            CachedResponse::Listing(listing) => Ok(listing),
            CachedResponse::Prices(_) => Err(StockError::fetch(
                "failed to fetch stocks",
                "cache entry holds price data",
            )),
        }
    }

    /// Price history for `ticker` over the last `minutes`, or its latest
    /// quote when no (or a zero) window is given.
    #[instrument(skip(self), name = "gateway::price_history")]
    pub async fn price_history(&self, ticker: &str, minutes: Option<u32>) -> StockResult<PriceHistory> {
        let minutes = effective_window(minutes);
        let key = price_cache_key(ticker, minutes);

        let cached = self
            .cached_or_fetch(&key, self.policy.price_ttl(minutes), self.fetch_prices(ticker, minutes))
            .await?;

        match cached {
            CachedResponse::Prices(history) => Ok(history),
            CachedResponse::Listing(_) => Err(StockError::fetch(
                format!("failed to fetch stock price for {ticker}"),
                "cache entry holds listing data",
            )),
        }
    }

    /// Drop one cache entry. Returns `true` if it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.delete(key)
    }

    /// Drop every cached response and the held bearer token.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.auth.invalidate();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Serve `key` from cache, or run `fetch` and cache its result for `ttl`.
    /// `fetch` is lazy and only polled on a miss.
    async fn cached_or_fetch<F>(&self, key: &str, ttl: Duration, fetch: F) -> StockResult<CachedResponse>
    where
        F: Future<Output = StockResult<CachedResponse>>,
    {
        if let Some(hit) = self.cache.get(key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let lease = self.lease(key);
        let _guard = lease.acquire().await;

        if let Some(hit) = self.cache.get(key) {
            debug!(key, "cache filled by a concurrent request");
            return Ok(hit);
        }

        debug!(key, "cache miss, fetching from upstream");
        let fresh = fetch.await?;
        self.cache.set(key, fresh.clone(), ttl);
        Ok(fresh)
    }

    fn lease<'a>(&'a self, key: &'a str) -> GateLease<'a> {
        let gate = self
            .in_flight
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        GateLease {
            in_flight: &self.in_flight,
            key,
            gate: Some(gate),
        }
    }

    async fn fetch_listing(&self) -> StockResult<CachedResponse> {
        const CONTEXT: &str = "failed to fetch stocks";

        let token = self
            .auth
            .valid_token()
            .await
            .map_err(|e| StockError::fetch(CONTEXT, e))?;

        let stocks = self.upstream.list_stocks(&token).await.map_err(|e| {
            let reason = format!("{e:#}");
            warn!(error = %reason, "stock listing fetch failed");
            StockError::fetch(CONTEXT, reason)
        })?;

        Ok(CachedResponse::Listing(Arc::new(stocks)))
    }

    async fn fetch_prices(&self, ticker: &str, minutes: Option<u32>) -> StockResult<CachedResponse> {
        let context = || format!("failed to fetch stock price for {ticker}");

        let token = self
            .auth
            .valid_token()
            .await
            .map_err(|e| StockError::fetch(context(), e))?;

        let points = self
            .upstream
            .price_history(&token, ticker, minutes)
            .await
            .map_err(|e| {
                let reason = format!("{e:#}");
                warn!(ticker, error = %reason, "price history fetch failed");
                StockError::fetch(context(), reason)
            })?;

        Ok(CachedResponse::Prices(points.into()))
    }
}

impl std::fmt::Debug for StockDataGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockDataGateway")
            .field("upstream", &self.upstream)
            .field("cache", &self.cache)
            .field("policy", &self.policy)
            .finish()
    }
}
