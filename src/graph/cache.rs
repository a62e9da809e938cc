// Ancestor closure cache keyed by role

use crate::observability::MetricsRecorder;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CacheEntry {
    ancestors: Arc<HashSet<Uuid>>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Memoizes `ancestors(role)` for a bounded time.
///
/// Every inheritance mutation bumps the generation and clears the map. A
/// closure computed under an older generation is discarded on insert, so a
/// lookup racing with an invalidation can never repopulate stale data.
pub struct AncestorCache {
    ttl: Duration,
    generation: AtomicU64,
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
}

impl AncestorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Token to pass back to [`AncestorCache::insert`]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, role_id: Uuid) -> Option<Arc<HashSet<Uuid>>> {
        let hit = self.entries.read().ok().and_then(|entries| {
            entries
                .get(&role_id)
                .filter(|entry| !entry.is_expired(Instant::now()))
                .map(|entry| Arc::clone(&entry.ancestors))
        });

        match hit {
            Some(_) => MetricsRecorder::record_cache_hit(),
            None => MetricsRecorder::record_cache_miss(),
        }
        hit
    }

    /// Store a closure computed while `generation` was current
    pub fn insert(&self, role_id: Uuid, ancestors: Arc<HashSet<Uuid>>, generation: u64) {
        if let Ok(mut entries) = self.entries.write() {
            // Checked under the write lock; invalidate_all bumps before clearing
            if self.generation.load(Ordering::Acquire) != generation {
                return;
            }
            entries.insert(
                role_id,
                CacheEntry {
                    ancestors,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_after_insert() {
        let cache = AncestorCache::new(Duration::from_secs(60));
        let role = Uuid::new_v4();
        let parent = Uuid::new_v4();

        assert!(cache.get(role).is_none());
        cache.insert(role, Arc::new(HashSet::from([parent])), cache.generation());

        let cached = cache.get(role).unwrap();
        assert!(cached.contains(&parent));
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let cache = AncestorCache::new(Duration::from_secs(60));
        let role = Uuid::new_v4();

        let generation = cache.generation();
        cache.invalidate_all();
        cache.insert(role, Arc::new(HashSet::new()), generation);

        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_miss() {
        let cache = AncestorCache::new(Duration::from_millis(0));
        let role = Uuid::new_v4();

        cache.insert(role, Arc::new(HashSet::new()), cache.generation());
        assert!(cache.get(role).is_none());
    }

    #[test]
    fn test_invalidate_clears() {
        let cache = AncestorCache::new(Duration::from_secs(60));
        cache.insert(Uuid::new_v4(), Arc::new(HashSet::new()), cache.generation());
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
