use crate::models::UploadSession;
use crate::services::tiered_store::{TieredKeyValueStore, WriteOutcome};
use crate::services::tiers::Tier;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Corrupt record at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A record read back from the tiered store, with the tier that served it.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    pub record: T,
    pub tier: Tier,
}

pub fn session_key(session_id: &str) -> String {
    format!("chunked:session:{}", session_id)
}

pub struct SessionStore {
    kv: Arc<TieredKeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<TieredKeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Stored<UploadSession>>, StoreError> {
        let key = session_key(session_id);
        let read = self.kv.read(&key).await;
        let (Some(raw), Some(tier)) = (read.value, read.tier) else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: key.clone(),
            source,
        })?;
        Ok(Some(Stored { record, tier }))
    }

    pub async fn put(
        &self,
        session: &UploadSession,
        ttl_secs: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let key = session_key(&session.session_id);
        let raw = serde_json::to_string(session).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        Ok(self.kv.write(&key, &raw, ttl_secs).await)
    }
}
