//! The minimization pipeline.
//!
//! One call to [`Minimizer::minimize`] runs:
//!
//! 1. Cache lookup on the input sequence and target.  A hit short-circuits
//!    the rest.
//! 2. Pattern analysis, memoized per input.
//! 3. Rewriting toward the requested target.
//! 4. Metrics (tokens saved, compression ratio, elapsed time).
//! 5. Storing the optimized sequence under the input's key for that target.
//!
//! Results are scoped by target name, so the same input rewritten for
//! `speed` and for `accuracy` occupies two cache entries.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use cmdseq_kernel::{
    AnalysisReport, OptimizationTarget, PatternAnalyzer, PipelineConfig, Sequence,
    SequenceRewriter, Strategy,
};
use cmdseq_store::{CacheKey, CacheStatistics, SharedSequenceCache, key_for, scoped_key_for};
use moka::sync::Cache;
use serde::Serialize;
use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// How the optimized sequence of a run was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Answered from the result cache.
    CacheHit,
    /// Produced by the rewriter.
    Rewrite { strategy: Strategy },
    /// The request could not be served; the input is returned unchanged.
    Fallback { reason: String },
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit => f.write_str("cache hit"),
            Self::Rewrite { strategy } => write!(f, "rewrite ({strategy:?})"),
            Self::Fallback { reason } => write!(f, "fallback: {reason}"),
        }
    }
}

/// Outcome and metrics of one minimization run.
#[derive(Debug, Clone, Serialize)]
pub struct MinimizationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// `None` when the requested target could not be parsed.
    pub target: Option<OptimizationTarget>,
    pub method: Method,
    pub key: CacheKey,
    pub original: Sequence,
    pub optimized: Sequence,
    /// `max(0, original.len() - optimized.len())`.
    pub tokens_saved: usize,
    /// `tokens_saved / original.len()`, `0.0` for empty input.
    pub compression_ratio: f64,
    pub elapsed: Duration,
    /// Analysis used by the rewrite; absent on cache hits and fallbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
}

impl MinimizationReport {
    pub fn is_cache_hit(&self) -> bool {
        self.method == Method::CacheHit
    }
}

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub default_target: OptimizationTarget,
    pub runs: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub cache: CacheStatistics,
    pub analysis_memo_entries: u64,
    pub motif_count: usize,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "default target : {}", self.default_target)?;
        writeln!(
            f,
            "runs           : {} ({} cache hits, {} fallbacks)",
            self.runs, self.cache_hits, self.fallbacks
        )?;
        writeln!(f, "cache          : {}", self.cache)?;
        writeln!(f, "analysis memo  : {} entries", self.analysis_memo_entries)?;
        write!(f, "motifs         : {}", self.motif_count)
    }
}

// ---------------------------------------------------------------------------
// Minimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RunCounters {
    runs: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
}

/// Cache-aware front end over [`SequenceRewriter`].
///
/// Cloning is cheap; clones share the cache, the analysis memo and the run
/// counters.
#[derive(Clone)]
pub struct Minimizer {
    rewriter: Arc<SequenceRewriter>,
    cache: SharedSequenceCache<Sequence>,
    analyses: Cache<CacheKey, Arc<AnalysisReport>>,
    counters: Arc<RunCounters>,
    span: Span,
}

impl fmt::Debug for Minimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minimizer")
            .field("rewriter", &self.rewriter)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Minimizer {
    /// Assemble a minimizer logging under a default `minimizer` span.
    pub fn new(
        rewriter: SequenceRewriter,
        cache: SharedSequenceCache<Sequence>,
        memo_capacity: u64,
    ) -> Self {
        Self::with_span(rewriter, cache, memo_capacity, info_span!("minimizer"))
    }

    /// Assemble a minimizer whose events are recorded under `span`.
    pub fn with_span(
        rewriter: SequenceRewriter,
        cache: SharedSequenceCache<Sequence>,
        memo_capacity: u64,
        span: Span,
    ) -> Self {
        Self {
            rewriter: Arc::new(rewriter),
            cache,
            analyses: Cache::new(memo_capacity),
            counters: Arc::new(RunCounters::default()),
            span,
        }
    }

    /// The span this minimizer records its events under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Build every component from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = PatternAnalyzer::new(&config.analyzer);
        let rewriter = SequenceRewriter::new(analyzer, &config.rewrite)?;
        let cache = SharedSequenceCache::from_config("results", &config.cache, &config.signature)?;

        info!(
            capacity = config.cache.capacity,
            ttl_secs = config.cache.ttl_secs,
            target = %config.rewrite.target,
            motifs = config.analyzer.motifs.len(),
            "minimizer initialized"
        );
        Ok(Self::new(
            rewriter,
            cache,
            config.cache.analysis_memo_capacity,
        ))
    }

    pub fn rewriter(&self) -> &SequenceRewriter {
        &self.rewriter
    }

    pub fn cache(&self) -> &SharedSequenceCache<Sequence> {
        &self.cache
    }

    /// Analysis of `sequence`, computed once per cache key while it stays
    /// in the memo.
    pub fn analyze(&self, sequence: &Sequence) -> Arc<AnalysisReport> {
        let analyzer = self.rewriter.analyzer();
        self.analyses
            .get_with(key_for(sequence), || Arc::new(analyzer.analyze(sequence)))
    }

    /// Minimize toward the rewriter's configured default target.
    pub fn minimize_default(&self, sequence: &Sequence) -> MinimizationReport {
        self.minimize(sequence, self.rewriter.default_target())
    }

    /// Run the full pipeline on `sequence`.
    pub fn minimize(&self, sequence: &Sequence, target: OptimizationTarget) -> MinimizationReport {
        let _guard = self.span.enter();
        let started_at = Utc::now();
        let clock = Instant::now();
        let scope = target.as_str();
        let key = scoped_key_for(scope, sequence);
        self.counters.runs.fetch_add(1, Ordering::Relaxed);

        if let Some(cached) = self.cache.retrieve_scoped(scope, sequence) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = key.short(), target = %target, "minimization served from cache");
            return finish(Draft {
                started_at,
                clock,
                target: Some(target),
                method: Method::CacheHit,
                key,
                original: sequence.clone(),
                optimized: cached,
                analysis: None,
            });
        }

        let analysis = self.analyze(sequence);
        let rewritten = self
            .rewriter
            .rewrite_with_analysis(sequence, target, &analysis);
        self.cache
            .store_scoped(scope, sequence, Some(rewritten.sequence.clone()));

        let report = finish(Draft {
            started_at,
            clock,
            target: Some(target),
            method: Method::Rewrite {
                strategy: rewritten.strategy,
            },
            key,
            original: sequence.clone(),
            optimized: rewritten.sequence,
            analysis: Some(AnalysisReport::clone(&analysis)),
        });
        info!(
            run_id = %report.run_id,
            key = report.key.short(),
            target = %target,
            before = report.original.len(),
            after = report.optimized.len(),
            ratio = report.compression_ratio,
            "sequence minimized"
        );
        report
    }

    /// Run the pipeline toward a target given by name.
    ///
    /// An unknown target degrades to the unmodified input; the failure is
    /// logged and recorded in [`Method::Fallback`].
    pub fn minimize_named(&self, sequence: &Sequence, target: &str) -> MinimizationReport {
        match target.parse::<OptimizationTarget>() {
            Ok(target) => self.minimize(sequence, target),
            Err(err) => {
                let _guard = self.span.enter();
                self.counters.runs.fetch_add(1, Ordering::Relaxed);
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(%err, "minimization failed, returning input unchanged");
                finish(Draft {
                    started_at: Utc::now(),
                    clock: Instant::now(),
                    target: None,
                    method: Method::Fallback {
                        reason: err.to_string(),
                    },
                    key: key_for(sequence),
                    original: sequence.clone(),
                    optimized: sequence.clone(),
                    analysis: None,
                })
            }
        }
    }

    /// Counters, cache statistics and memo size.
    pub fn status(&self) -> SystemStatus {
        self.analyses.run_pending_tasks();
        SystemStatus {
            default_target: self.rewriter.default_target(),
            runs: self.counters.runs.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            cache: self.cache.statistics(),
            analysis_memo_entries: self.analyses.entry_count(),
            motif_count: self.rewriter.analyzer().motifs().len(),
        }
    }

    /// Drop cached results and memoized analyses.
    pub fn clear(&self) {
        self.cache.clear();
        self.analyses.invalidate_all();
        debug!("minimizer caches cleared");
    }
}

// -- Private helpers --------------------------------------------------------

struct Draft {
    started_at: DateTime<Utc>,
    clock: Instant,
    target: Option<OptimizationTarget>,
    method: Method,
    key: CacheKey,
    original: Sequence,
    optimized: Sequence,
    analysis: Option<AnalysisReport>,
}

fn finish(draft: Draft) -> MinimizationReport {
    let tokens_saved = draft.original.len().saturating_sub(draft.optimized.len());
    let compression_ratio = if draft.original.is_empty() {
        0.0
    } else {
        tokens_saved as f64 / draft.original.len() as f64
    };
    MinimizationReport {
        run_id: Uuid::now_v7(),
        started_at: draft.started_at,
        target: draft.target,
        method: draft.method,
        key: draft.key,
        original: draft.original,
        optimized: draft.optimized,
        tokens_saved,
        compression_ratio,
        elapsed: draft.clock.elapsed(),
        analysis: draft.analysis,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
