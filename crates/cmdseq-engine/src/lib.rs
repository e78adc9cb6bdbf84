//! # cmdseq-engine
//!
//! The minimization pipeline: cache lookup, memoized pattern analysis,
//! rewriting and metrics, with the optimized result stored back into the
//! content-addressed cache.
//!
//! ```ignore
//! use cmdseq_engine::Minimizer;
//! use cmdseq_kernel::{OptimizationTarget, PipelineConfig, Sequence};
//!
//! let minimizer = Minimizer::from_config(&PipelineConfig::default())?;
//! let report = minimizer.minimize(&sequence, OptimizationTarget::Speed);
//! println!("saved {} commands", report.tokens_saved);
//! ```

pub mod error;
pub mod minimizer;

pub use error::{EngineError, Result};
pub use minimizer::{MinimizationReport, Method, Minimizer, SystemStatus};
