//! Thread-safe handle around [`SequenceCache`].
//!
//! Each call takes the lock once, so capacity check, eviction and insert
//! happen in a single critical section.  A poisoned lock is recovered
//! rather than propagated.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cmdseq_kernel::{CacheConfig, Sequence, SignatureConfig};

use crate::cache::{CacheEntry, CacheKey, CacheStatistics, SequenceCache};
use crate::error::StoreResult;

/// Cloneable, shareable [`SequenceCache`].
pub struct SharedSequenceCache<V> {
    inner: Arc<Mutex<SequenceCache<V>>>,
}

impl<V> Clone for SharedSequenceCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for SharedSequenceCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSequenceCache").finish_non_exhaustive()
    }
}

impl<V: Clone> From<SequenceCache<V>> for SharedSequenceCache<V> {
    fn from(cache: SequenceCache<V>) -> Self {
        Self::new(cache)
    }
}

impl<V: Clone> SharedSequenceCache<V> {
    pub fn new(cache: SequenceCache<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Build from pipeline configuration with the system clock.
    pub fn from_config(
        name: &'static str,
        cache: &CacheConfig,
        signature: &SignatureConfig,
    ) -> StoreResult<Self> {
        SequenceCache::from_config(name, cache, signature).map(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, SequenceCache<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the underlying cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut SequenceCache<V>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn store(&self, sequence: &Sequence, result: Option<V>) -> CacheKey {
        self.lock().store(sequence, result)
    }

    pub fn retrieve(&self, sequence: &Sequence) -> Option<V> {
        self.lock().retrieve(sequence)
    }

    pub fn store_scoped(&self, scope: &str, sequence: &Sequence, result: Option<V>) -> CacheKey {
        self.lock().store_scoped(scope, sequence, result)
    }

    pub fn retrieve_scoped(&self, scope: &str, sequence: &Sequence) -> Option<V> {
        self.lock().retrieve_scoped(scope, sequence)
    }

    pub fn contains_scoped(&self, scope: &str, sequence: &Sequence) -> bool {
        self.lock().contains_scoped(scope, sequence)
    }

    /// Owned copy of the entry for `sequence`, counting a hit or a miss.
    pub fn lookup(&self, sequence: &Sequence) -> Option<CacheEntry<V>> {
        self.lock().lookup(sequence).cloned()
    }

    pub fn similar(&self, sequence: &Sequence, threshold: f64) -> Vec<(CacheKey, f64)> {
        self.lock().similar(sequence, threshold)
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.lock().statistics()
    }

    pub fn contains(&self, sequence: &Sequence) -> bool {
        self.lock().contains(sequence)
    }

    pub fn remove(&self, sequence: &Sequence) -> Option<CacheEntry<V>> {
        self.lock().remove(sequence)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(items: &[&str]) -> Sequence {
        Sequence::from_strs(items.iter().copied()).unwrap()
    }

    #[test]
    fn clones_share_state() {
        let cache: SharedSequenceCache<u32> =
            SharedSequenceCache::new(SequenceCache::builder("shared").capacity(4).build().unwrap());
        let other = cache.clone();
        cache.store(&seq(&["A"]), Some(7));
        assert_eq!(other.retrieve(&seq(&["A"])), Some(7));
        assert_eq!(other.statistics().hits, 1);
    }

    #[test]
    fn with_cache_runs_under_one_lock() {
        let cache: SharedSequenceCache<u32> =
            SharedSequenceCache::new(SequenceCache::builder("shared").build().unwrap());
        let len = cache.with_cache(|inner| {
            inner.store(&seq(&["A"]), None);
            inner.store(&seq(&["B"]), None);
            inner.len()
        });
        assert_eq!(len, 2);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache: SharedSequenceCache<u32> =
            SharedSequenceCache::new(SequenceCache::builder("shared").build().unwrap());
        let poisoner = cache.clone();
        let result = std::thread::spawn(move || {
            let _: () = poisoner.with_cache(|_| panic!("boom"));
        })
        .join();
        assert!(result.is_err());

        cache.store(&seq(&["A"]), Some(1));
        assert_eq!(cache.retrieve(&seq(&["A"])), Some(1));
    }
}
