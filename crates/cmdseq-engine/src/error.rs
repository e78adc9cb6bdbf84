//! Engine error types.
//!
//! Failures from the kernel and store crates surface through
//! [`EngineError`].  Minimization itself does not fail; only building the
//! pipeline can.

/// Unified error type for the minimization engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration or input reported by the kernel.
    #[error(transparent)]
    Kernel(#[from] cmdseq_kernel::KernelError),

    /// The result cache could not be built.
    #[error(transparent)]
    Store(#[from] cmdseq_store::StoreError),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
