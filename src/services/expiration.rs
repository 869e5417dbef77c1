use crate::services::tiers::{DurableStore, ProcessMemory};
use crate::utils::keyed_mutex::KeyedMutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Counts from one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub memory: usize,
    pub durable: u64,
}

/// Periodically drops expired records from the tiers that do not expire
/// entries on their own, and forgets idle session locks.
///
/// Process-local state (memory tier, lock map) can only be swept by the
/// process that owns it; the durable table can be swept from anywhere.
pub struct ExpiryWorker {
    memory: Option<Arc<ProcessMemory>>,
    locks: Option<KeyedMutex>,
    durable: Option<DurableStore>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ExpiryWorker {
    pub fn new(interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            memory: None,
            locks: None,
            durable: None,
            interval,
            shutdown,
        }
    }

    /// Sweep this process's memory tier and session locks.
    pub fn with_process_state(mut self, memory: Arc<ProcessMemory>, locks: KeyedMutex) -> Self {
        self.memory = Some(memory);
        self.locks = Some(locks);
        self
    }

    pub fn with_durable(mut self, durable: DurableStore) -> Self {
        self.durable = Some(durable);
        self
    }

    pub fn has_work(&self) -> bool {
        self.memory.is_some() || self.durable.is_some()
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Expiry worker started (every {:?})", self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Expiry worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep_once().await;
                }
            }
        }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(memory) = &self.memory {
            report.memory = memory.sweep_expired();
        }

        if let Some(durable) = &self.durable {
            match durable.sweep_expired().await {
                Ok(n) => report.durable = n,
                Err(e) => tracing::error!("Durable sweep failed: {}", e),
            }
        }

        if let Some(locks) = &self.locks {
            locks.cleanup();
        }

        if report.memory > 0 || report.durable > 0 {
            tracing::info!(
                "🧹 Expired {} memory and {} durable records",
                report.memory,
                report.durable
            );
        }
        report
    }
}
