use crate::config::UploadConfig;
use crate::services::tiers::{FastCache, Tier, TierBackend, UnavailableTier};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds the fast tier. A missing or unparsable `REDIS_URL` yields a tier
/// that always reports itself unavailable.
pub fn setup_fast_cache(config: &UploadConfig) -> Arc<dyn TierBackend> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::warn!("⚡ REDIS_URL not set, fast tier disabled");
        return Arc::new(UnavailableTier::new(Tier::Fast));
    };

    match FastCache::new(
        url,
        Duration::from_millis(config.fast_cache_timeout_ms),
        Duration::from_secs(config.fast_cache_cooldown_secs),
    ) {
        Ok(cache) => {
            info!("⚡ Fast cache: {}", url);
            Arc::new(cache)
        }
        Err(e) => {
            tracing::error!("❌ Invalid REDIS_URL, fast tier disabled: {}", e);
            Arc::new(UnavailableTier::new(Tier::Fast))
        }
    }
}
