//! cmdseq kernel.
//!
//! Core building blocks of the command-sequence pipeline:
//!
//! - **[`sequence`]** -- [`Command`] and [`Sequence`], the opaque tokens and
//!   ordered lists everything else operates on.
//! - **[`analyzer`]** -- [`PatternAnalyzer`], which detects repeated
//!   subsequences, catalog motifs and runs of similar operations.
//! - **[`rewriter`]** -- [`SequenceRewriter`], which rewrites a sequence
//!   toward a `speed`, `accuracy`, `memory` or `auto` target and scores the
//!   candidates.
//! - **[`signature`]** -- keyword signatures and Jaccard similarity, built on
//!   [`aho_corasick`].
//! - **[`config`]** -- typed, TOML-loadable configuration.
//! - **[`error`]** -- [`KernelError`] via [`thiserror`].
//!
//! Everything here is synchronous and free of shared mutable state; the
//! analyzer and rewriter are plain values that can be shared across threads.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod rewriter;
pub mod sequence;
pub mod signature;
pub mod target;

pub use analyzer::{
    AnalysisReport, CompressionCandidate, CompressionKind, MotifHit, PatternAnalyzer,
    RepeatedSubsequence, SimilarityRun,
};
pub use config::{
    AnalyzerConfig, CacheConfig, Motif, MotifKind, NameMapping, PipelineConfig, PrecisionStep,
    RewriteConfig, SignatureConfig,
};
pub use error::{KernelError, Result};
pub use rewriter::scoring::{RewriteCandidate, Strategy};
pub use rewriter::{RewriteReport, SequenceRewriter};
pub use sequence::{Command, Sequence};
pub use signature::{Signature, SignatureExtractor, jaccard};
pub use target::OptimizationTarget;
