// =============================================================================
// Application State — explicitly constructed service context
// =============================================================================
//
// One cache, one token authenticator and one upstream client per `AppState`.
// Nothing is global: tests (or a second configuration in the same process)
// build their own instance.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::info;

use crate::config::{Credentials, ServiceConfig};
use crate::correlation_assembler::CorrelationAssembler;
use crate::gateway::{CachePolicy, StockDataGateway};
use crate::ttl_cache::TtlCache;
use crate::upstream::{TokenAuthenticator, UpstreamClient};

/// Shared state handed to every request handler via `Arc<AppState>`.
pub struct AppState {
    pub config: ServiceConfig,
    pub gateway: Arc<StockDataGateway>,
    pub correlator: CorrelationAssembler,
    /// Used for the uptime figure on the health endpoint.
    pub start_time: Instant,
}

impl AppState {
    /// Wire upstream client, authenticator, cache and gateway from `config`.
    pub fn new(config: ServiceConfig, credentials: Credentials) -> Result<Self> {
        let upstream = Arc::new(UpstreamClient::new(
            config.upstream_base_url.clone(),
            config.request_timeout(),
        )?);

        let auth = Arc::new(TokenAuthenticator::new(
            upstream.clone(),
            credentials,
            config.token_refresh_margin_secs,
        ));

        let policy = CachePolicy::from_config(&config);
        let gateway = Arc::new(StockDataGateway::new(
            upstream,
            auth,
            Arc::new(TtlCache::new()),
            policy,
        ));

        info!(
            upstream = %config.upstream_base_url,
            listing_ttl_secs = policy.listing_ttl.as_secs(),
            window_ttl_secs = policy.window_ttl.as_secs(),
            latest_ttl_secs = policy.latest_ttl.as_secs(),
            "service context initialised"
        );

        Ok(Self::with_gateway(config, gateway))
    }

    /// Build the state around an already-wired gateway.
    pub fn with_gateway(config: ServiceConfig, gateway: Arc<StockDataGateway>) -> Self {
        Self {
            config,
            correlator: CorrelationAssembler::new(gateway.clone()),
            gateway,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
