//! # cmdseq-store
//!
//! Content-addressed cache for command sequences.
//!
//! Sequences are keyed by the SHA-256 of their canonical JSON form, so
//! identical sequences always share an entry and permutations never do.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  SharedSequenceCache (Arc<Mutex<_>>)    │
//! ├─────────────────────────────────────────┤
//! │  SequenceCache                          │
//! │    LFU eviction, access-ledger ties     │
//! │    lazy TTL expiry                      │
//! │    keyword-signature similarity         │
//! ├─────────────────────────────────────────┤
//! │  Clock (SystemClock / ManualClock)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use cmdseq_store::{SequenceCache, SharedSequenceCache};
//!
//! let cache: SharedSequenceCache<String> = SharedSequenceCache::new(
//!     SequenceCache::builder("results")
//!         .capacity(1000)
//!         .ttl_seconds(3600)
//!         .build()?,
//! );
//! cache.store(&sequence, Some("result".into()));
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod shared;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{
    CacheEntry, CacheKey, CacheStatistics, SequenceCache, SequenceCacheBuilder, key_for,
    scoped_key_for,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use shared::SharedSequenceCache;
