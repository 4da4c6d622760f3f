//! Concurrent cache store keyed by request identity.
//!
//! The single source of truth for "what is currently available". Safe for
//! concurrent reads and writes from the dispatch path and every worker
//! thread with no external locking; there is no implicit eviction beyond
//! the collectible reclaim pass.

use crate::buffer::DecodedImage;
use crate::cache::entry::{CacheEntry, Fidelity, Retention};
use crate::request::ImageRequest;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Concurrent mapping from [`ImageRequest`] to [`CacheEntry`].
pub struct ResourceCache {
    entries: DashMap<ImageRequest, CacheEntry>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the buffer for a key, refreshing its access time.
    pub fn get(&self, key: &ImageRequest) -> Option<Arc<DecodedImage>> {
        self.entries.get_mut(key).map(|mut entry| {
            entry.touch();
            Arc::clone(&entry.image)
        })
    }

    /// Fidelity of the entry currently held for a key, if any.
    pub fn fidelity(&self, key: &ImageRequest) -> Option<Fidelity> {
        self.entries.get(key).map(|entry| entry.fidelity)
    }

    /// Install or overwrite the entry for a key.
    ///
    /// A displaced entry's buffer is released when its last outstanding
    /// reference drops.
    pub fn put(&self, key: ImageRequest, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Install a preview buffer only if the key has no entry yet.
    ///
    /// Keeps a racing full decode from being clobbered by a stale preview:
    /// once a full entry is visible it is never replaced by a preview.
    /// Returns the buffer now held for the key.
    pub fn put_preview_if_absent(
        &self,
        key: ImageRequest,
        image: Arc<DecodedImage>,
        retention: Retention,
    ) -> Arc<DecodedImage> {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| CacheEntry::new(image, retention, Fidelity::Preview));
        Arc::clone(&entry.image)
    }

    /// Remove the entry for a key, returning it.
    pub fn remove(&self, key: &ImageRequest) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Whether the key currently has an entry.
    pub fn contains_key(&self, key: &ImageRequest) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of all keys currently cached.
    pub fn keys(&self) -> Vec<ImageRequest> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Estimated resident size in bytes over all held buffers.
    pub fn estimated_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.estimated_bytes())
            .sum()
    }

    /// Evict collectible entries, least recently accessed first, until the
    /// estimated resident size is at or below `target_bytes`.
    ///
    /// Strong entries are never evicted. Returns the number of entries
    /// removed.
    pub fn reclaim_to(&self, target_bytes: usize) -> usize {
        let mut resident = self.estimated_bytes();
        if resident <= target_bytes {
            return 0;
        }

        let mut candidates: Vec<(ImageRequest, Instant, usize)> = self
            .entries
            .iter()
            .filter(|entry| entry.retention == Retention::Collectible)
            .map(|entry| (entry.key().clone(), entry.last_access, entry.estimated_bytes()))
            .collect();
        candidates.sort_by_key(|(_, last_access, _)| *last_access);

        let mut evicted = 0;
        for (key, _, bytes) in candidates {
            if resident <= target_bytes {
                break;
            }
            if self.entries.remove(&key).is_some() {
                resident = resident.saturating_sub(bytes);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                evicted,
                resident_bytes = resident,
                "reclaimed collectible cache entries"
            );
        }
        evicted
    }

    /// Evict every collectible entry regardless of resident size.
    ///
    /// This is the simulated memory-pressure collection pass; strong
    /// entries always survive it.
    pub fn reclaim_collectible(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.retention == Retention::Strong);
        before - self.entries.len()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
