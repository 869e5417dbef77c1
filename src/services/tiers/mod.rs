pub mod durable;
pub mod fast_cache;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

pub use durable::DurableStore;
pub use fast_cache::FastCache;
pub use memory::ProcessMemory;

/// Expiry cap applied by the tiers themselves, so any `ttl_secs` a caller
/// passes yields a representable deadline.
pub const MAX_TIER_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Storage tiers in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Durable,
    Memory,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Durable => "durable",
            Tier::Memory => "memory",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum TierError {
    #[error("{0} tier unavailable: {1}")]
    Unavailable(Tier, String),

    #[error("{0} tier timed out")]
    Timeout(Tier),

    #[error("{0} tier backend error: {1}")]
    Backend(Tier, String),
}

/// Uniform get/set/delete capability over one storage engine.
#[async_trait]
pub trait TierBackend: Send + Sync {
    fn tier(&self) -> Tier;

    async fn get(&self, key: &str) -> Result<Option<String>, TierError>;

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TierError>;

    /// Removing a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> Result<(), TierError>;

    async fn ping(&self) -> Result<(), TierError>;
}

/// Placeholder for a tier that has no backing engine configured.
pub struct UnavailableTier {
    tier: Tier,
}

impl UnavailableTier {
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }

    fn err(&self) -> TierError {
        TierError::Unavailable(self.tier, "not configured".to_string())
    }
}

#[async_trait]
impl TierBackend for UnavailableTier {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, TierError> {
        Err(self.err())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), TierError> {
        Err(self.err())
    }

    async fn delete(&self, _key: &str) -> Result<(), TierError> {
        Err(self.err())
    }

    async fn ping(&self) -> Result<(), TierError> {
        Err(self.err())
    }
}
