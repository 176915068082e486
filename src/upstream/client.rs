// =============================================================================
// Upstream REST Client — evaluation-service stock API
// =============================================================================
//
// Three endpoints:
//   POST /auth                      credential bundle -> bearer token
//   GET  /stocks                    listing (bearer)
//   GET  /stocks/{ticker}[?minutes] price history or latest quote (bearer)
//
// Errors stay as `anyhow` here; the token and gateway layers turn them into
// tagged `StockError`s.  Bearer tokens are never logged.
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::Credentials;
use crate::types::PricePoint;

/// Response body of `POST /auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absolute expiry in epoch seconds as sent by the upstream (see
    /// `AuthToken::from_grant` for the relative-lifetime fallback).
    pub expires_in: i64,
}

/// HTTP client for the upstream stock API.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client rooted at `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "UpstreamClient initialised");

        Ok(Self { base_url, client })
    }

    // -------------------------------------------------------------------------
    // Auth
    // -------------------------------------------------------------------------

    /// POST /auth — exchange the credential bundle for a bearer token.
    #[instrument(skip_all, name = "upstream::exchange_credentials")]
    pub async fn exchange_credentials(&self, credentials: &Credentials) -> Result<TokenGrant> {
        let url = format!("{}/auth", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .await
            .context("POST /auth request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("upstream POST /auth returned {}: {}", status, body);
        }

        let grant: TokenGrant = resp
            .json()
            .await
            .context("failed to parse auth response")?;

        debug!(expires_in = grant.expires_in, "bearer token issued");
        Ok(grant)
    }

    // -------------------------------------------------------------------------
    // Market data
    // -------------------------------------------------------------------------

    /// GET /stocks — the `stocks` object of the listing response.
    #[instrument(skip(self, token), name = "upstream::list_stocks")]
    pub async fn list_stocks(&self, token: &str) -> Result<serde_json::Map<String, Value>> {
        let url = format!("{}/stocks", self.base_url);
        let body = self.get_json(&url, token, None, "GET /stocks").await?;

        let stocks = body
            .get("stocks")
            .and_then(Value::as_object)
            .cloned()
            .context("stocks response is missing the 'stocks' object")?;

        debug!(count = stocks.len(), "stock listing fetched");
        Ok(stocks)
    }

    /// GET /stocks/{ticker} — price history for the last `minutes`, or the
    /// latest quote when no window is given.
    #[instrument(skip(self, token), name = "upstream::price_history")]
    pub async fn price_history(
        &self,
        token: &str,
        ticker: &str,
        minutes: Option<u32>,
    ) -> Result<Vec<PricePoint>> {
        let url = self.ticker_url(ticker)?;
        let body = self
            .get_json(url.as_str(), token, minutes, "GET /stocks/{ticker}")
            .await?;

        let points = normalize_price_body(body)?;
        debug!(ticker, ?minutes, count = points.len(), "price history fetched");
        Ok(points)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// `{base}/stocks/{ticker}` with the ticker percent-encoded as a single
    /// path segment.
    fn ticker_url(&self, ticker: &str) -> Result<reqwest::Url> {
        if matches!(ticker, "" | "." | "..") {
            anyhow::bail!("invalid ticker {:?}", ticker);
        }

        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid upstream base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("upstream base URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .push("stocks")
            .push(ticker);
        Ok(url)
    }

    async fn get_json(
        &self,
        url: &str,
        token: &str,
        minutes: Option<u32>,
        label: &str,
    ) -> Result<Value> {
        let mut req = self.client.get(url).bearer_auth(token);
        if let Some(m) = minutes {
            req = req.query(&[("minutes", m)]);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{label} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("upstream {} returned {}: {}", label, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {label} response"))
    }
}

/// Normalise the per-ticker response into a sequence of points.
///
/// * array                      -> used as is
/// * object with a `stock` key  -> one-element sequence
/// * anything else              -> empty sequence
///
/// A recognised shape with malformed points is an error.
pub fn normalize_price_body(body: Value) -> Result<Vec<PricePoint>> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<PricePoint>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("price history array has malformed points"),
        Value::Object(mut obj) => match obj.remove("stock") {
            Some(stock) => {
                let point: PricePoint = serde_json::from_value(stock)
                    .context("latest price 'stock' object is malformed")?;
                Ok(vec![point])
            }
            None => {
                warn!("price response has neither an array nor a 'stock' object");
                Ok(Vec::new())
            }
        },
        _ => {
            warn!("price response is not a JSON object or array");
            Ok(Vec::new())
        }
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_body_is_used_as_is() {
        let body = json!([
            { "price": 100.0, "lastUpdatedAt": "2025-05-08T04:00:00Z" },
            { "price": 102.0, "lastUpdatedAt": "2025-05-08T04:01:00Z" },
        ]);
        let points = normalize_price_body(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 100.0);
        assert_eq!(points[1].price, 102.0);
    }

    #[test]
    fn stock_object_is_wrapped() {
        let body = json!({ "stock": { "price": 231.95, "lastUpdatedAt": "2025-05-08T04:26:27Z" } });
        let points = normalize_price_body(body).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 231.95);
    }

    #[test]
    fn unknown_shapes_are_empty() {
        assert!(normalize_price_body(json!({ "message": "nothing" })).unwrap().is_empty());
        assert!(normalize_price_body(json!("oops")).unwrap().is_empty());
        assert!(normalize_price_body(Value::Null).unwrap().is_empty());
        assert!(normalize_price_body(json!([])).unwrap().is_empty());
    }

    #[test]
    fn malformed_points_are_errors() {
        assert!(normalize_price_body(json!([{ "price": "abc" }])).is_err());
        assert!(normalize_price_body(json!({ "stock": { "price": 1.0 } })).is_err());
    }

    #[test]
    fn ticker_is_encoded_as_one_path_segment() {
        let client = UpstreamClient::new(
            "http://localhost:1/evaluation-service/",
            std::time::Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            client.ticker_url("AAPL").unwrap().as_str(),
            "http://localhost:1/evaluation-service/stocks/AAPL"
        );
        assert_eq!(
            client.ticker_url("../auth").unwrap().path(),
            "/evaluation-service/stocks/..%2Fauth"
        );

        let url = client.ticker_url("AAPL?minutes=1#frag").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn dot_segments_are_rejected() {
        let client =
            UpstreamClient::new("http://localhost:1", std::time::Duration::from_secs(1)).unwrap();
        assert!(client.ticker_url("..").is_err());
        assert!(client.ticker_url(".").is_err());
        assert!(client.ticker_url("").is_err());
        assert_eq!(client.ticker_url("BRK.B").unwrap().path(), "/stocks/BRK.B");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            UpstreamClient::new("http://localhost:1/", std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:1");
    }
}
