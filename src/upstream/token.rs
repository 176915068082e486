// =============================================================================
// Token Authenticator — cached bearer token for the upstream API
// =============================================================================
//
// A token is handed out only while it has more than `refresh_margin_secs`
// (default 300 s) left.  Otherwise the credential bundle is exchanged again and
// the new token replaces the old one.  Failures are reported as `AuthFailure`
// and never retried here; the caller decides.
//
// Refreshes are serialised behind an async lock and re-checked after it is
// acquired, so a burst of requests that all see an expired token triggers one
// exchange.  The token itself sits in a sync lock that is never held across an
// `.await`.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{StockError, StockResult};
use crate::upstream::client::{TokenGrant, UpstreamClient};

pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 300;

/// `expires_in` values below this cannot be epoch timestamps (2001-09-09) and
/// are read as a lifetime in seconds instead.
const EPOCH_FLOOR_SECS: i64 = 1_000_000_000;

/// A bearer token and its absolute expiry.
#[derive(Clone)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: i64,
}

impl AuthToken {
    pub fn from_grant(grant: TokenGrant, now: i64) -> Self {
        let expires_at = if grant.expires_in >= EPOCH_FLOOR_SECS {
            grant.expires_in
        } else {
            now + grant.expires_in
        };
        Self {
            token: grant.access_token,
            expires_at,
        }
    }

    /// `true` while more than `margin` seconds remain at `now`.
    pub fn is_usable(&self, now: i64, margin: i64) -> bool {
        now + margin < self.expires_at
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Obtains and caches the upstream bearer token.
pub struct TokenAuthenticator {
    client: Arc<UpstreamClient>,
    credentials: Credentials,
    refresh_margin_secs: i64,
    current: RwLock<Option<AuthToken>>,
    refresh: AsyncMutex<()>,
}

impl TokenAuthenticator {
    pub fn new(
        client: Arc<UpstreamClient>,
        credentials: Credentials,
        refresh_margin_secs: i64,
    ) -> Self {
        Self {
            client,
            credentials,
            refresh_margin_secs,
            current: RwLock::new(None),
            refresh: AsyncMutex::new(()),
        }
    }

    /// Return a token with more than the refresh margin left, exchanging
    /// credentials first if the cached one is missing or too close to expiry.
    pub async fn valid_token(&self) -> StockResult<String> {
        if let Some(token) = self.usable_token() {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.usable_token() {
            debug!("token was refreshed by a concurrent request");
            return Ok(token);
        }

        let grant = self
            .client
            .exchange_credentials(&self.credentials)
            .await
            .map_err(|e| {
                let reason = format!("{e:#}");
                warn!(error = %reason, "credential exchange failed");
                StockError::AuthFailure(reason)
            })?;

        let now = Utc::now().timestamp();
        let token = AuthToken::from_grant(grant, now);
        if !token.is_usable(now, self.refresh_margin_secs) {
            warn!(
                expires_at = token.expires_at,
                margin_secs = self.refresh_margin_secs,
                "upstream issued a token that is already inside the refresh margin"
            );
        }

        info!(expires_at = token.expires_at, "bearer token refreshed");
        let value = token.token.clone();
        *self.current.write() = Some(token);
        Ok(value)
    }

    /// Forget the cached token so the next call exchanges credentials.
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    fn usable_token(&self) -> Option<String> {
        let now = Utc::now().timestamp();
        self.current
            .read()
            .as_ref()
            .filter(|t| t.is_usable(now, self.refresh_margin_secs))
            .map(|t| t.token.clone())
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .field("current", &*self.current.read())
            .finish()
    }
}
