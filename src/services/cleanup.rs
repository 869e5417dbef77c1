use crate::services::chunk_store::ChunkStore;
use crate::services::tiers::Tier;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    /// Session key plus one key per chunk index.
    pub keys: u64,
    /// Tiers that rejected at least one delete. Usually tiers that are down.
    pub failed_tiers: Vec<Tier>,
}

/// Removes every record of a finished upload from all tiers.
pub struct CleanupAgent {
    chunks: Arc<ChunkStore>,
}

impl CleanupAgent {
    pub fn new(chunks: Arc<ChunkStore>) -> Self {
        Self { chunks }
    }

    /// Safe to call repeatedly; absent keys are skipped silently.
    pub async fn purge(&self, session_id: &str, total_chunks: u32) -> PurgeReport {
        let outcome = self.chunks.delete_all(session_id, total_chunks).await;
        let report = PurgeReport {
            keys: u64::from(total_chunks) + 1,
            failed_tiers: outcome.failed,
        };

        if report.failed_tiers.is_empty() {
            tracing::info!("🧹 Purged session {} ({} keys)", session_id, report.keys);
        } else {
            tracing::warn!(
                "🧹 Purged session {} ({} keys), unreachable tiers: {:?}",
                session_id,
                report.keys,
                report.failed_tiers
            );
        }
        report
    }
}
