use crate::services::tiers::{ProcessMemory, Tier, TierBackend};
use futures::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub ok: bool,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub value: Option<String>,
    pub tier: Option<Tier>,
}

impl ReadOutcome {
    fn miss() -> Self {
        Self {
            value: None,
            tier: None,
        }
    }
}

/// Tiers whose delete call failed. Empty on a clean delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub failed: Vec<Tier>,
}

/// Key-value store over three tiers with a fixed preference order:
/// fast cache, durable store, process memory.
///
/// A write lands on exactly one tier, the first that accepts it. Reads try
/// all tiers in the same order because the store keeps no record of where a
/// key was written. Deletes go to every tier.
pub struct TieredKeyValueStore {
    fast: Arc<dyn TierBackend>,
    durable: Arc<dyn TierBackend>,
    memory: Arc<ProcessMemory>,
}

impl TieredKeyValueStore {
    pub fn new(
        fast: Arc<dyn TierBackend>,
        durable: Arc<dyn TierBackend>,
        memory: Arc<ProcessMemory>,
    ) -> Self {
        Self {
            fast,
            durable,
            memory,
        }
    }

    /// Never fails: the memory tier always accepts the write.
    pub async fn write(&self, key: &str, value: &str, ttl_secs: u64) -> WriteOutcome {
        for backend in [&self.fast, &self.durable] {
            match backend.set(key, value, ttl_secs).await {
                Ok(()) => {
                    return WriteOutcome {
                        ok: true,
                        tier: backend.tier(),
                    };
                }
                Err(e) => {
                    tracing::warn!("Write of {} fell through {}: {}", key, backend.tier(), e);
                }
            }
        }

        self.memory.put(key, value, ttl_secs);
        WriteOutcome {
            ok: true,
            tier: Tier::Memory,
        }
    }

    pub async fn read(&self, key: &str) -> ReadOutcome {
        for backend in [&self.fast, &self.durable] {
            match backend.get(key).await {
                Ok(Some(value)) => {
                    return ReadOutcome {
                        value: Some(value),
                        tier: Some(backend.tier()),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("Read of {} skipped {}: {}", key, backend.tier(), e);
                }
            }
        }

        match self.memory.fetch(key) {
            Some(value) => ReadOutcome {
                value: Some(value),
                tier: Some(Tier::Memory),
            },
            None => ReadOutcome::miss(),
        }
    }

    pub async fn delete(&self, key: &str) -> DeleteOutcome {
        self.memory.remove(key);

        let results = join_all([self.fast.delete(key), self.durable.delete(key)]).await;

        let mut outcome = DeleteOutcome::default();
        for (backend, result) in [&self.fast, &self.durable].into_iter().zip(results) {
            if let Err(e) = result {
                tracing::debug!("Delete of {} failed on {}: {}", key, backend.tier(), e);
                outcome.failed.push(backend.tier());
            }
        }
        outcome
    }

    /// Availability of each tier, for health reporting.
    pub async fn check_tiers(&self) -> Vec<(Tier, bool)> {
        vec![
            (Tier::Fast, self.fast.ping().await.is_ok()),
            (Tier::Durable, self.durable.ping().await.is_ok()),
            (Tier::Memory, true),
        ]
    }

    pub fn memory(&self) -> &Arc<ProcessMemory> {
        &self.memory
    }
}
