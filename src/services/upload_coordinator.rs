use crate::config::UploadConfig;
use crate::models::{SessionPhase, UploadSession};
use crate::services::chunk_store::ChunkStore;
use crate::services::cleanup::CleanupAgent;
use crate::services::ingestion::{DocumentIngestor, IngestionResponse};
use crate::services::reassembler::{self, ReassemblyError};
use crate::services::session_store::{SessionStore, StoreError};
use crate::services::tiered_store::TieredKeyValueStore;
use crate::services::tiers::Tier;
use crate::utils::keyed_mutex::KeyedMutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    pub persistent_id: Option<String>,
    #[validate(range(min = 1, message = "totalChunks must be positive"))]
    pub total_chunks: i64,
    #[validate(range(min = 0, message = "totalSize must not be negative"))]
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub is_update: bool,
    #[serde(default)]
    pub is_compressed: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadResponse {
    pub session_id: String,
}

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    pub session_id: String,
    #[validate(range(min = 0, message = "chunkIndex must not be negative"))]
    pub chunk_index: i64,
    pub data: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub success: bool,
    pub received_chunks: u32,
    pub total_chunks: u32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub session_id: String,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    #[schema(value_type = String)]
    pub phase: SessionPhase,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub missing_chunks: Vec<u32>,
    pub tier: Tier,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Declared size {size} exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Upload session not found or expired")]
    SessionNotFound,

    #[error("Chunk index {index} out of range for {total} chunks")]
    ChunkIndexOutOfRange { index: i64, total: u32 },

    #[error("Not all chunks received")]
    IncompleteUpload { received: u32, total: u32 },

    #[error("Chunk {0} is missing")]
    ChunkMissing(u32),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReassemblyError> for UploadError {
    fn from(e: ReassemblyError) -> Self {
        match e {
            ReassemblyError::DecompressionFailed(msg) => UploadError::DecompressionFailed(msg),
            ReassemblyError::MalformedPayload(e) => UploadError::MalformedPayload(e.to_string()),
        }
    }
}

/// Drives the three-phase chunked upload protocol: start, upload, complete.
///
/// Session updates are serialized per session through an in-process lock.
/// `receivedChunks` is always recomputed from the presence map, so duplicate
/// or retried uploads of the same index never inflate the count.
pub struct UploadCoordinator {
    sessions: SessionStore,
    chunks: Arc<ChunkStore>,
    cleanup: CleanupAgent,
    ingestor: Arc<dyn DocumentIngestor>,
    locks: KeyedMutex,
    config: UploadConfig,
}

impl UploadCoordinator {
    pub fn new(
        kv: Arc<TieredKeyValueStore>,
        ingestor: Arc<dyn DocumentIngestor>,
        config: UploadConfig,
    ) -> Self {
        let chunks = Arc::new(ChunkStore::new(kv.clone()));
        Self {
            sessions: SessionStore::new(kv),
            cleanup: CleanupAgent::new(chunks.clone()),
            chunks,
            ingestor,
            locks: KeyedMutex::new(),
            config,
        }
    }

    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }

    fn ttl(&self) -> u64 {
        self.config.effective_ttl_secs()
    }

    pub async fn start(&self, req: StartUploadRequest) -> Result<StartUploadResponse, UploadError> {
        req.validate()
            .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;

        let total_chunks = u32::try_from(req.total_chunks)
            .ok()
            .filter(|n| *n <= self.config.max_total_chunks)
            .ok_or_else(|| {
                UploadError::InvalidRequest(format!(
                    "totalChunks must be at most {}",
                    self.config.max_total_chunks
                ))
            })?;

        let total_size = req.total_size as u64;
        if total_size > self.config.max_total_size {
            return Err(UploadError::PayloadTooLarge {
                size: total_size,
                limit: self.config.max_total_size,
            });
        }

        let persistent_id = req
            .persistent_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if req.is_update && persistent_id.is_none() {
            return Err(UploadError::InvalidRequest(
                "persistentId is required for updates".to_string(),
            ));
        }

        let session = UploadSession::new(
            Uuid::new_v4().to_string(),
            persistent_id,
            total_chunks,
            total_size,
            req.is_update,
            req.is_compressed,
        );
        let written = self.sessions.put(&session, self.ttl()).await?;

        tracing::info!(
            "📦 Chunked upload started: session={} chunks={} size={} update={} compressed={} tier={}",
            session.session_id,
            total_chunks,
            total_size,
            session.is_update,
            session.is_compressed,
            written.tier
        );

        Ok(StartUploadResponse {
            session_id: session.session_id,
        })
    }

    pub async fn upload_chunk(
        &self,
        req: UploadChunkRequest,
    ) -> Result<UploadChunkResponse, UploadError> {
        req.validate()
            .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;

        let session = self
            .sessions
            .get(&req.session_id)
            .await?
            .ok_or(UploadError::SessionNotFound)?
            .record;

        let chunk_index = u32::try_from(req.chunk_index)
            .ok()
            .filter(|i| *i < session.total_chunks)
            .ok_or(UploadError::ChunkIndexOutOfRange {
                index: req.chunk_index,
                total: session.total_chunks,
            })?;

        let chunk_write = self
            .chunks
            .put(&req.session_id, chunk_index, req.data, self.ttl())
            .await?;

        let _guard = self.locks.lock(&req.session_id).await;

        // Re-read under the lock; another upload may have updated the map
        let Some(stored) = self.sessions.get(&req.session_id).await? else {
            // Purged by a concurrent complete after the chunk was written
            self.chunks.delete(&req.session_id, chunk_index).await;
            return Err(UploadError::SessionNotFound);
        };
        let mut session = stored.record;
        let first_delivery = session.mark_received(chunk_index);
        let session_write = self.sessions.put(&session, self.ttl()).await?;

        tracing::debug!(
            "Chunk {}/{} for session {} stored (chunk tier={}, session tier={}, first={})",
            chunk_index + 1,
            session.total_chunks,
            session.session_id,
            chunk_write.tier,
            session_write.tier,
            first_delivery
        );

        Ok(UploadChunkResponse {
            success: true,
            received_chunks: session.received_chunks,
            total_chunks: session.total_chunks,
        })
    }

    pub async fn status(&self, session_id: &str) -> Result<SessionStatusResponse, UploadError> {
        let stored = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(UploadError::SessionNotFound)?;
        let session = stored.record;

        let missing_chunks = (0..session.total_chunks)
            .filter(|i| !session.chunks.get(i).copied().unwrap_or(false))
            .collect();

        Ok(SessionStatusResponse {
            phase: session.phase(),
            session_id: session.session_id,
            received_chunks: session.received_chunks,
            total_chunks: session.total_chunks,
            missing_chunks,
            tier: stored.tier,
        })
    }

    /// Reassembles the upload and hands it to the ingestor.
    ///
    /// Missing-chunk, decompression and parse failures leave the session in
    /// place until its TTL lapses.
    pub async fn complete(&self, session_id: &str) -> Result<IngestionResponse, UploadError> {
        let guard = self.locks.lock(session_id).await;
        let result = self.complete_locked(session_id).await;
        drop(guard);

        self.locks.release(session_id);
        result
    }

    async fn complete_locked(&self, session_id: &str) -> Result<IngestionResponse, UploadError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(UploadError::SessionNotFound)?
            .record;

        if !session.is_complete() {
            return Err(UploadError::IncompleteUpload {
                received: session.received_chunks,
                total: session.total_chunks,
            });
        }

        let mut payloads = Vec::with_capacity(session.total_chunks as usize);
        for index in 0..session.total_chunks {
            match self.chunks.get(session_id, index).await? {
                Some(chunk) => payloads.push(chunk.record.data),
                None => {
                    tracing::error!("❌ Session {} is missing chunk {}", session_id, index);
                    return Err(UploadError::ChunkMissing(index));
                }
            }
        }

        let document = reassembler::reassemble(&payloads, session.is_compressed).map_err(|e| {
            tracing::error!("❌ Reassembly of session {} failed: {}", session_id, e);
            UploadError::from(e)
        })?;
        tracing::info!(
            "🧩 Reassembled session {} from {} chunks",
            session_id,
            session.total_chunks
        );

        let response = if session.is_update {
            let persistent_id = session.persistent_id.as_deref().ok_or_else(|| {
                UploadError::InvalidRequest("session has no persistentId".to_string())
            })?;
            self.ingestor.update(persistent_id, document).await
        } else {
            self.ingestor.create(document).await
        };

        if response.is_success() || self.config.purge_on_ingest_failure {
            self.cleanup.purge(session_id, session.total_chunks).await;
        } else {
            tracing::warn!(
                "⚠️ Ingestion for session {} returned {}; session retained for retry",
                session_id,
                response.status
            );
        }

        Ok(response)
    }
}
