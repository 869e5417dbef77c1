use crate::models::Chunk;
use crate::services::session_store::{StoreError, Stored, session_key};
use crate::services::tiered_store::{DeleteOutcome, TieredKeyValueStore, WriteOutcome};
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;

/// Concurrent deletes issued while purging one session.
const DELETE_CONCURRENCY: usize = 16;

pub fn chunk_key(session_id: &str, chunk_index: u32) -> String {
    format!("chunked:chunk:{}:{}", session_id, chunk_index)
}

pub struct ChunkStore {
    kv: Arc<TieredKeyValueStore>,
}

impl ChunkStore {
    pub fn new(kv: Arc<TieredKeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn get(
        &self,
        session_id: &str,
        chunk_index: u32,
    ) -> Result<Option<Stored<Chunk>>, StoreError> {
        let key = chunk_key(session_id, chunk_index);
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

    /// Writes (or overwrites) the payload for one index.
    pub async fn put(
        &self,
        session_id: &str,
        chunk_index: u32,
        data: String,
        ttl_secs: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let key = chunk_key(session_id, chunk_index);
        let chunk = Chunk {
            session_id: session_id.to_string(),
            chunk_index,
            data,
            created_at: Utc::now(),
        };
        let raw = serde_json::to_string(&chunk).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        Ok(self.kv.write(&key, &raw, ttl_secs).await)
    }

    pub async fn delete(&self, session_id: &str, chunk_index: u32) -> DeleteOutcome {
        self.kv.delete(&chunk_key(session_id, chunk_index)).await
    }

    /// Deletes chunk keys `0..total_chunks` and the session key from every
    /// tier. The returned outcome lists each tier that failed at least once.
    pub async fn delete_all(&self, session_id: &str, total_chunks: u32) -> DeleteOutcome {
        let keys = (0..total_chunks)
            .map(|index| chunk_key(session_id, index))
            .chain(std::iter::once(session_key(session_id)));

        let outcomes: Vec<DeleteOutcome> = stream::iter(keys)
            .map(|key| async move { self.kv.delete(&key).await })
            .buffer_unordered(DELETE_CONCURRENCY)
            .collect()
            .await;

        let mut merged = DeleteOutcome::default();
        for tier in outcomes.into_iter().flat_map(|o| o.failed) {
            if !merged.failed.contains(&tier) {
                merged.failed.push(tier);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tiers::{ProcessMemory, Tier, UnavailableTier};

    fn setup() -> (Arc<TieredKeyValueStore>, ChunkStore) {
        let kv = Arc::new(TieredKeyValueStore::new(
            Arc::new(UnavailableTier::new(Tier::Fast)),
            Arc::new(UnavailableTier::new(Tier::Durable)),
            Arc::new(ProcessMemory::new()),
        ));
        (kv.clone(), ChunkStore::new(kv))
    }

    #[tokio::test]
    async fn test_reupload_overwrites() {
        let (_kv, store) = setup();
        store.put("s", 0, "old".into(), 60).await.unwrap();
        store.put("s", 0, "new".into(), 60).await.unwrap();

        let chunk = store.get("s", 0).await.unwrap().unwrap();
        assert_eq!(chunk.record.data, "new");
        assert_eq!(chunk.record.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_delete_all_removes_chunks_and_session() {
        let (kv, store) = setup();
        kv.write(&session_key("s"), "{}", 60).await;
        for i in 0..3 {
            store.put("s", i, format!("part-{i}"), 60).await.unwrap();
        }

        let outcome = store.delete_all("s", 3).await;
        // Both unconfigured tiers fail their deletes; memory is cleared regardless
        assert_eq!(outcome.failed.len(), 2);
        assert!(kv.memory().is_empty());
        for i in 0..3 {
            assert!(store.get("s", i).await.unwrap().is_none());
        }
    }
}
