use super::MAX_TIER_TTL_SECS;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Last-resort tier: an in-process map with per-entry expiry. Infallible,
/// so it is used directly rather than through `TierBackend`.
///
/// Constructed once per process and shared by `Arc`. Contents do not survive
/// a restart and are not visible to other server instances.
#[derive(Default)]
pub struct ProcessMemory {
    entries: DashMap<String, MemoryEntry>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: &str, ttl_secs: u64) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs.min(MAX_TIER_TTL_SECS)))
            .unwrap_or(now);
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub fn fetch(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|entry| {
            if entry.expires_at > now {
                Some(entry.value.clone())
            } else {
                None
            }
        });

        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                // The read guard above is dropped before removal.
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops expired entries and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_fetch_remove() {
        let memory = ProcessMemory::new();
        memory.put("k", "v", 60);
        assert_eq!(memory.fetch("k").as_deref(), Some("v"));

        memory.remove("k");
        assert!(memory.fetch("k").is_none());

        // Removing again is a no-op
        memory.remove("k");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let memory = ProcessMemory::new();
        memory.put("k", "v", 0);
        assert!(memory.fetch("k").is_none());
        assert_eq!(memory.len(), 0);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let memory = ProcessMemory::new();
        memory.put("k", "v", u64::MAX);
        assert_eq!(memory.fetch("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_sweep_expired() {
        let memory = ProcessMemory::new();
        memory.put("old", "v", 0);
        memory.put("fresh", "v", 60);
        assert_eq!(memory.sweep_expired(), 1);
        assert_eq!(memory.len(), 1);
        assert!(memory.fetch("fresh").is_some());
    }
}
