//! Content-addressed sequence cache.
//!
//! Entries are keyed by the SHA-256 of a sequence's canonical form, so the
//! same commands in the same order always land on the same key.  The cache
//! holds at most `capacity` entries; when full, inserting a new key evicts
//! the least frequently accessed entry, with ties broken by the oldest
//! position in the access ledger.  Expiry is lazy: an entry past its TTL is
//! dropped the next time it is looked up.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cmdseq_kernel::{CacheConfig, Sequence, Signature, SignatureConfig, SignatureExtractor, jaccard};
use ring::digest;
use serde::Serialize;
use tracing::{Span, debug};

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};

// ── keys ─────────────────────────────────────────────────────────────

/// Lowercase hex SHA-256 of a sequence's canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the cache key of `sequence`.
pub fn key_for(sequence: &Sequence) -> CacheKey {
    scoped_key_for("", sequence)
}

/// Cache key of `sequence` within `scope`.
///
/// Different scopes never share a key.  The empty scope is the plain
/// [`key_for`] key.
pub fn scoped_key_for(scope: &str, sequence: &Sequence) -> CacheKey {
    let mut ctx = digest::Context::new(&digest::SHA256);
    if !scope.is_empty() {
        ctx.update(scope.as_bytes());
        ctx.update(&[0]);
    }
    ctx.update(sequence.canonical_form().as_bytes());
    CacheKey(ctx.finish().as_ref().iter().map(|b| format!("{b:02x}")).collect())
}

// ── entries ──────────────────────────────────────────────────────────

/// A stored sequence and its optional associated result.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub sequence: Sequence,
    pub result: Option<V>,
    pub created_at: DateTime<Utc>,
    /// Successful lookups since the entry was stored.
    pub access_count: u64,
    /// Keyword signature used by [`SequenceCache::similar`].
    pub tags: Signature,
    /// Position in the access ledger; larger is more recent.
    #[serde(skip)]
    touched: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        ttl == TimeDelta::zero() || now - self.created_at > ttl
    }
}

// ── statistics ───────────────────────────────────────────────────────

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub entry_count: usize,
    pub capacity: usize,
    /// Sum of `access_count` over live entries.
    pub total_accesses: u64,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
    /// Approximation `1 - 1 / (1 + mean(access_count + 1))` over live
    /// entries.  Not a measured ratio; kept for comparison with older
    /// reports.  `0.0` when empty.
    pub estimated_hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries={}/{} hits={} misses={} rate={:.2}% est={:.2}% evictions={} expirations={}",
            self.entry_count,
            self.capacity,
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.estimated_hit_rate * 100.0,
            self.evictions,
            self.expirations,
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

// ── cache ────────────────────────────────────────────────────────────

/// Bounded, content-addressed store of sequences and their results.
///
/// All operations take `&mut self`; wrap in
/// [`SharedSequenceCache`](crate::SharedSequenceCache) to share across
/// threads.
///
/// # Example
///
/// ```ignore
/// use cmdseq_store::SequenceCache;
///
/// let mut cache: SequenceCache<String> = SequenceCache::builder("results")
///     .capacity(100)
///     .ttl_seconds(60)
///     .build()?;
///
/// let key = cache.store(&sequence, Some("done".into()));
/// assert_eq!(cache.retrieve(&sequence), Some("done".into()));
/// ```
pub struct SequenceCache<V> {
    name: &'static str,
    capacity: usize,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    signatures: SignatureExtractor,
    entries: HashMap<CacheKey, CacheEntry<V>>,
    tick: u64,
    counters: Counters,
    span: Span,
}

impl<V> fmt::Debug for SequenceCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<V: Clone> SequenceCache<V> {
    /// Start building a new cache.
    pub fn builder(name: &'static str) -> SequenceCacheBuilder<V> {
        SequenceCacheBuilder {
            name,
            capacity: CacheConfig::default().capacity,
            ttl: CacheConfig::default().ttl(),
            clock: None,
            keywords: SignatureConfig::default().keywords,
            span: None,
            _marker: PhantomData,
        }
    }

    /// Build a cache from pipeline configuration with the system clock.
    pub fn from_config(
        name: &'static str,
        cache: &CacheConfig,
        signature: &SignatureConfig,
    ) -> StoreResult<Self> {
        Self::builder(name)
            .capacity(cache.capacity)
            .ttl(cache.ttl())
            .keywords(signature.keywords.clone())
            .build()
    }

    /// Store `sequence` with an optional `result` and return its key.
    ///
    /// Re-storing an existing key replaces the entry in place.  A new key
    /// arriving at capacity first evicts the least accessed entry.
    pub fn store(&mut self, sequence: &Sequence, result: Option<V>) -> CacheKey {
        self.store_scoped("", sequence, result)
    }

    /// [`Self::store`] under the key of `sequence` within `scope`.
    pub fn store_scoped(&mut self, scope: &str, sequence: &Sequence, result: Option<V>) -> CacheKey {
        let _span = self.span.clone().entered();
        let key = scoped_key_for(scope, sequence);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        let entry = CacheEntry {
            key: key.clone(),
            sequence: sequence.clone(),
            result,
            created_at: self.clock.now(),
            access_count: 0,
            tags: self.signatures.extract(sequence),
            touched: self.next_tick(),
        };
        let replaced = self.entries.insert(key.clone(), entry).is_some();
        debug!(cache = self.name, key = key.short(), replaced, "cache store");
        key
    }

    /// Look up the entry for `sequence`, counting a hit or a miss.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn lookup(&mut self, sequence: &Sequence) -> Option<&CacheEntry<V>> {
        self.lookup_scoped("", sequence)
    }

    /// [`Self::lookup`] under the key of `sequence` within `scope`.
    pub fn lookup_scoped(&mut self, scope: &str, sequence: &Sequence) -> Option<&CacheEntry<V>> {
        let _span = self.span.clone().entered();
        let key = scoped_key_for(scope, sequence);
        let now = self.clock.now();

        let expired = match self.entries.get(&key) {
            None => {
                self.counters.misses += 1;
                debug!(cache = self.name, key = key.short(), "cache miss");
                return None;
            }
            Some(entry) => entry.is_expired(now, self.ttl),
        };

        if expired {
            self.entries.remove(&key);
            self.counters.misses += 1;
            self.counters.expirations += 1;
            debug!(cache = self.name, key = key.short(), "cache entry expired");
            return None;
        }

        let tick = self.next_tick();
        self.counters.hits += 1;
        let entry = self.entries.get_mut(&key)?;
        entry.access_count += 1;
        entry.touched = tick;
        debug!(
            cache = self.name,
            key = key.short(),
            access_count = entry.access_count,
            "cache hit"
        );
        Some(&*entry)
    }

    /// The result stored for `sequence`, if any and not expired.
    pub fn retrieve(&mut self, sequence: &Sequence) -> Option<V> {
        self.retrieve_scoped("", sequence)
    }

    /// [`Self::retrieve`] under the key of `sequence` within `scope`.
    pub fn retrieve_scoped(&mut self, scope: &str, sequence: &Sequence) -> Option<V> {
        self.lookup_scoped(scope, sequence)
            .and_then(|entry| entry.result.clone())
    }

    /// Keys of live entries whose keyword signature has Jaccard similarity
    /// of at least `threshold` with `sequence`, most similar first.
    ///
    /// The query's own key is skipped.  Entries whose signatures share no
    /// keywords with the query, and empty-on-both-sides pairs, score `0.0`.
    pub fn similar(&self, sequence: &Sequence, threshold: f64) -> Vec<(CacheKey, f64)> {
        let own = key_for(sequence);
        let query = self.signatures.extract(sequence);
        let now = self.clock.now();

        let mut found: Vec<(CacheKey, f64)> = self
            .entries
            .values()
            .filter(|entry| entry.key != own && !entry.is_expired(now, self.ttl))
            .filter_map(|entry| {
                let score = jaccard(&query, &entry.tags).unwrap_or(0.0);
                (score >= threshold).then(|| (entry.key.clone(), score))
            })
            .collect();
        found.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        found
    }

    /// Summary counters and timestamps.
    pub fn statistics(&self) -> CacheStatistics {
        let entry_count = self.entries.len();
        let total_accesses = self.entries.values().map(|e| e.access_count).sum();
        let lookups = self.counters.hits + self.counters.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.counters.hits as f64 / lookups as f64
        };
        let estimated_hit_rate = if entry_count == 0 {
            0.0
        } else {
            let mean = self
                .entries
                .values()
                .map(|e| (e.access_count + 1) as f64)
                .sum::<f64>()
                / entry_count as f64;
            1.0 - 1.0 / (1.0 + mean)
        };

        CacheStatistics {
            entry_count,
            capacity: self.capacity,
            total_accesses,
            hits: self.counters.hits,
            misses: self.counters.misses,
            hit_rate,
            estimated_hit_rate,
            evictions: self.counters.evictions,
            expirations: self.counters.expirations,
            oldest_entry: self.entries.values().map(|e| e.created_at).min(),
            newest_entry: self.entries.values().map(|e| e.created_at).max(),
        }
    }

    /// Whether a live entry exists for `sequence`.  Does not count as a
    /// lookup.
    pub fn contains(&self, sequence: &Sequence) -> bool {
        self.contains_scoped("", sequence)
    }

    /// [`Self::contains`] under the key of `sequence` within `scope`.
    pub fn contains_scoped(&self, scope: &str, sequence: &Sequence) -> bool {
        let now = self.clock.now();
        self.entries
            .get(&scoped_key_for(scope, sequence))
            .is_some_and(|entry| !entry.is_expired(now, self.ttl))
    }

    /// Remove and return the entry for `sequence`.
    pub fn remove(&mut self, sequence: &Sequence) -> Option<CacheEntry<V>> {
        let key = key_for(sequence);
        let removed = self.entries.remove(&key);
        if removed.is_some() {
            debug!(cache = self.name, key = key.short(), "cache remove");
        }
        removed
    }

    /// Drop every entry.  Counters are kept; see [`Self::reset_stats`].
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!(cache = self.name, "cache clear");
    }

    /// Eagerly drop every expired entry and return how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));
        let purged = before - self.entries.len();
        self.counters.expirations += purged as u64;
        if purged > 0 {
            debug!(cache = self.name, purged, "expired entries purged");
        }
        purged
    }

    /// Reset hit, miss, eviction and expiration counters.
    pub fn reset_stats(&mut self) {
        self.counters = Counters::default();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::ZERO)
    }

    /// Entries from least to most recently touched.
    pub fn entries(&self) -> Vec<&CacheEntry<V>> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by_key(|e| e.touched);
        all
    }

    /// Keys from least to most recently touched.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries().into_iter().map(|e| e.key.clone()).collect()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .values()
            .min_by_key(|e| (e.access_count, e.touched))
            .map(|e| e.key.clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.counters.evictions += 1;
            debug!(cache = self.name, key = key.short(), "cache evict");
        }
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`SequenceCache`].
pub struct SequenceCacheBuilder<V> {
    name: &'static str,
    capacity: usize,
    ttl: Duration,
    clock: Option<Arc<dyn Clock>>,
    keywords: Vec<String>,
    span: Option<Span>,
    _marker: PhantomData<V>,
}

impl<V: Clone> SequenceCacheBuilder<V> {
    /// Maximum number of entries the cache will hold.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Entry lifetime.  `Duration::ZERO` expires entries immediately.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Entry lifetime in seconds.
    pub fn ttl_seconds(self, secs: u64) -> Self {
        self.ttl(Duration::from_secs(secs))
    }

    /// Time source for timestamps and expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Keywords used to build similarity signatures.
    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Span entered by mutating operations.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the cache.
    pub fn build(self) -> StoreResult<SequenceCache<V>> {
        if self.capacity == 0 {
            return Err(StoreError::CacheCapacity {
                name: self.name,
                capacity: self.capacity,
            });
        }
        let signatures = SignatureExtractor::new(&self.keywords)?;
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        let span = self
            .span
            .unwrap_or_else(|| tracing::debug_span!("sequence_cache", cache = self.name));

        debug!(
            name = self.name,
            capacity = self.capacity,
            ttl_seconds = self.ttl.as_secs(),
            "sequence cache created"
        );

        Ok(SequenceCache {
            name: self.name,
            capacity: self.capacity,
            ttl,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            signatures,
            entries: HashMap::new(),
            tick: 0,
            counters: Counters::default(),
            span,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
