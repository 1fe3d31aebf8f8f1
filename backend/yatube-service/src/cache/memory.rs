use super::{CacheResult, CachedPage, PageCache};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Entry count above which `set` sheds entries before inserting.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// Every this many inserts, `set` drops expired entries.
const SWEEP_EVERY: usize = 32;

/// Process-local page cache with per-entry deadlines.
///
/// Expired entries are swept periodically on write, and the map never holds
/// more than `max_entries` keys.
pub struct MemoryPageCache {
    entries: DashMap<String, (Instant, CachedPage)>,
    max_entries: usize,
    inserts: AtomicUsize,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (deadline, _)| *deadline > now);
        before.saturating_sub(self.entries.len())
    }

    // Sheds the entries closest to expiry until there is room for one more.
    fn make_room(&self) {
        if self.purge_expired() > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let excess = (self.entries.len() + 1).saturating_sub(self.max_entries);
        let mut deadlines: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().0, entry.key().clone()))
            .collect();
        deadlines.sort();
        for (_, key) in deadlines.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        debug!(evicted = excess, "Page cache full, evicted entries");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedPage>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.0 > now => return Ok(Some(entry.1.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, (deadline, _)| *deadline <= now);
            debug!(key = %key, "Page cache entry expired");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, page: &CachedPage, ttl: Duration) -> CacheResult<()> {
        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts % SWEEP_EVERY == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!(purged, "Page cache swept expired entries");
            }
        }
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        self.entries
            .insert(key.to_string(), (Instant::now() + ttl, page.clone()));
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Page cache set");
        Ok(())
    }

    async fn clear(&self) -> CacheResult<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        debug!(removed, "Page cache cleared");
        Ok(removed)
    }
}
