//! LRU cache for custom-policy lookups
//!
//! Caches `PolicyStore::find_by_profile_and_subjects` results per
//! (profile, subject set). Entries for a profile must be invalidated whenever
//! a custom policy in that profile is created, updated or deleted.
//!
//! Every invalidation bumps a generation counter. A lookup records the
//! generation before reading the store and [`PolicyCache::put`] drops the
//! result if an invalidation happened in between, so a slow reader cannot
//! resurrect policies that were already removed.

use super::{PermissionPolicy, ProfileId, Subject};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache key for a custom-policy lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    profile_id: ProfileId,
    subjects: Vec<Subject>,
}

impl CacheKey {
    fn new(profile_id: &ProfileId, subjects: &BTreeSet<Subject>) -> Self {
        CacheKey {
            profile_id: profile_id.clone(),
            subjects: subjects.iter().cloned().collect(),
        }
    }
}

/// Thread-safe LRU cache of custom-policy lookups
pub struct PolicyCache {
    cache: Mutex<LruCache<CacheKey, Arc<Vec<PermissionPolicy>>>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PolicyCache {
    /// Create a new policy cache with given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PolicyCache {
            cache: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cached lookup result
    pub fn get(
        &self,
        profile_id: &ProfileId,
        subjects: &BTreeSet<Subject>,
    ) -> Option<Arc<Vec<PermissionPolicy>>> {
        let key = CacheKey::new(profile_id, subjects);
        let found = self.cache.lock().get(&key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Current invalidation generation; read it before querying the store
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Put lookup result in cache
    ///
    /// Returns false (and caches nothing) if the cache was invalidated since
    /// `generation` was read.
    pub fn put(
        &self,
        profile_id: &ProfileId,
        subjects: &BTreeSet<Subject>,
        policies: Arc<Vec<PermissionPolicy>>,
        generation: u64,
    ) -> bool {
        let key = CacheKey::new(profile_id, subjects);
        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        cache.put(key, policies);
        true
    }

    /// Drop every entry for a profile
    pub fn invalidate_profile(&self, profile_id: &ProfileId) {
        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(key, _)| &key.profile_id == profile_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
