//! Per-client throttling of single-shot analysis
//!
//! Each upload costs a full detector and classifier pass, so `/analyze` is
//! limited per peer IP with tower_governor's GCRA quota.

use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config keyed by peer IP, with X-RateLimit-* response headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration for `/analyze`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Apply the limiter at all
    pub enabled: bool,
    /// Seconds between replenished requests
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: 2, // Replenish every 2 seconds
            burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    /// Create a strict config for shared deployments
    pub fn strict() -> Self {
        Self {
            per_second: 4, // One request every 4 seconds
            burst_size: 2,
            ..Default::default()
        }
    }

    /// Create a lenient config for local use
    pub fn lenient() -> Self {
        Self {
            per_second: 1,
            burst_size: 10,
            ..Default::default()
        }
    }
}

/// Create a rate limiting governor config
///
/// Returns `None` when the quota is invalid (zero period or burst).
/// Uses PeerIpKeyExtractor, so the service must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// Adds X-RateLimit-* headers to responses for quota visibility.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<DefaultGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}
