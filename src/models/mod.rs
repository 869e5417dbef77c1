use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bookkeeping record for one chunked upload. Chunk payloads live in their
/// own records; this only tracks which indices have arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    pub persistent_id: Option<String>,
    pub total_chunks: u32,
    pub total_size: u64,
    pub received_chunks: u32,
    pub is_update: bool,
    pub is_compressed: bool,
    pub chunks: BTreeMap<u32, bool>,
    pub created_at: DateTime<Utc>,
}

/// Live phase of a stored session. Finished, expired and failed sessions are
/// not represented: their records are gone or left to expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Created,
    Receiving,
    Complete,
}

impl UploadSession {
    pub fn new(
        session_id: String,
        persistent_id: Option<String>,
        total_chunks: u32,
        total_size: u64,
        is_update: bool,
        is_compressed: bool,
    ) -> Self {
        Self {
            session_id,
            persistent_id,
            total_chunks,
            total_size,
            received_chunks: 0,
            is_update,
            is_compressed,
            chunks: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Marks `index` present and recomputes `received_chunks` from the map.
    /// Returns true the first time an index is marked.
    pub fn mark_received(&mut self, index: u32) -> bool {
        let first = !self.chunks.get(&index).copied().unwrap_or(false);
        self.chunks.insert(index, true);
        self.received_chunks = self.chunks.values().filter(|present| **present).count() as u32;
        first
    }

    pub fn is_complete(&self) -> bool {
        self.received_chunks == self.total_chunks
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_complete() {
            SessionPhase::Complete
        } else if self.received_chunks == 0 {
            SessionPhase::Created
        } else {
            SessionPhase::Receiving
        }
    }
}

/// One ordered fragment of the payload, identified by session and index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub session_id: String,
    pub chunk_index: u32,
    pub data: String,
    pub created_at: DateTime<Utc>,
}
