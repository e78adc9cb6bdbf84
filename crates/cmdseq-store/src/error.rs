//! Error types for the cmdseq-store crate.
//!
//! All cache construction paths return [`StoreError`] via [`StoreResult`].
//! Lookups and inserts on a built cache never fail.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while building a cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cache was configured to hold no entries.
    #[error("cache `{name}` capacity must be at least 1, got {capacity}")]
    CacheCapacity { name: &'static str, capacity: usize },

    /// Building a kernel component (e.g. the signature extractor) failed.
    #[error("kernel error: {0}")]
    Kernel(#[from] cmdseq_kernel::KernelError),
}
