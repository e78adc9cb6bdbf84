//! Sequence rewriter.
//!
//! Rewrites a sequence toward an [`OptimizationTarget`]:
//!
//! | Target | Passes |
//! |--------|--------|
//! | `speed` | cancel adjacent inverse pairs, fuse same-axis rotations |
//! | `accuracy` | insert correction markers, refine precision tokens |
//! | `memory` | coarsen precision tokens, shorten long operation names |
//! | `auto` | motif templates, else compression markers, else run fusion |
//!
//! For the first three targets the target's own passes are scored against
//! the unchanged input (see [`scoring`]) and the lowest score wins, so a
//! named target never emits `auto` artifacts such as compression markers.
//! Pattern-driven passes always work from the [`AnalysisReport`] computed
//! before any rewriting.
//!
//! Fused rotation angles are a plain sum of parsed angles.  They are a
//! placeholder, not a physical composition of rotations.

mod passes;
pub mod scoring;
mod template;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{Span, debug, debug_span};

use crate::analyzer::{AnalysisReport, MotifHit, PatternAnalyzer};
use crate::config::RewriteConfig;
use crate::error::{KernelError, Result};
use crate::sequence::{Command, Sequence};
use crate::target::OptimizationTarget;

use self::passes::{AngleParser, Substitution};
use self::scoring::{RewriteCandidate, Scorer, Strategy, best_index};
use self::template::TemplateEngine;

pub use self::passes::{COMBINED_OP, COMPRESSED_PREFIX, compression_marker};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Full outcome of one rewrite, including every scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteReport {
    pub target: OptimizationTarget,
    pub strategy: Strategy,
    pub sequence: Sequence,
    pub candidates: Vec<RewriteCandidate>,
}

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// Stateless rewriter.  All tables are compiled once at construction.
#[derive(Debug, Clone)]
pub struct SequenceRewriter {
    analyzer: PatternAnalyzer,
    config: RewriteConfig,
    correction_marker: Command,
    angles: AngleParser,
    refine: Substitution,
    coarsen: Substitution,
    compact: Substitution,
    templates: TemplateEngine,
    scorer: Scorer,
    span: Span,
}

impl SequenceRewriter {
    /// Create a rewriter logging under a default `sequence_rewriter` span.
    pub fn new(analyzer: PatternAnalyzer, config: &RewriteConfig) -> Result<Self> {
        Self::with_span(analyzer, config, debug_span!("sequence_rewriter"))
    }

    /// Create a rewriter whose events are recorded under `span`.
    pub fn with_span(analyzer: PatternAnalyzer, config: &RewriteConfig, span: Span) -> Result<Self> {
        let correction_marker = Command::new(config.correction_marker.as_str()).map_err(|_| {
            KernelError::invalid_config("rewrite.correction_marker", "marker must not be blank")
        })?;

        let refine = Substitution::build(
            "rewrite.precision_steps",
            config
                .precision_steps
                .iter()
                .map(|s| (s.coarse.as_str(), s.fine.as_str())),
            false,
        )?;
        let coarsen = Substitution::build(
            "rewrite.precision_steps",
            config
                .precision_steps
                .iter()
                .map(|s| (s.fine.as_str(), s.coarse.as_str())),
            false,
        )?;
        let compact = Substitution::build(
            "rewrite.compact_names",
            config
                .compact_names
                .iter()
                .map(|m| (m.long.as_str(), m.short.as_str())),
            true,
        )?;

        let templates = TemplateEngine::new()?;
        for motif in analyzer.motifs() {
            templates.check(motif)?;
        }

        Ok(Self {
            correction_marker,
            angles: AngleParser::new(config.placeholder_angle)?,
            refine,
            coarsen,
            compact,
            templates,
            scorer: Scorer::new(config)?,
            config: config.clone(),
            analyzer,
            span,
        })
    }

    /// The analyzer used by the `auto` strategy.
    pub fn analyzer(&self) -> &PatternAnalyzer {
        &self.analyzer
    }

    /// Target used when a caller does not name one.
    pub fn default_target(&self) -> OptimizationTarget {
        self.config.target
    }

    /// Rewrite `sequence` toward `target`.
    pub fn rewrite(&self, sequence: &Sequence, target: OptimizationTarget) -> Sequence {
        self.rewrite_with_report(sequence, target).sequence
    }

    /// Rewrite toward a target given by name.
    ///
    /// Fails with [`KernelError::UnsupportedTarget`] for unknown names.
    pub fn rewrite_named(&self, sequence: &Sequence, target: &str) -> Result<Sequence> {
        let target = target.parse::<OptimizationTarget>()?;
        Ok(self.rewrite(sequence, target))
    }

    /// Rewrite and return every scored candidate.
    pub fn rewrite_with_report(
        &self,
        sequence: &Sequence,
        target: OptimizationTarget,
    ) -> RewriteReport {
        let report = self.analyzer.analyze(sequence);
        self.rewrite_with_analysis(sequence, target, &report)
    }

    /// Rewrite using an analysis computed elsewhere (e.g. memoized).
    ///
    /// `report` must describe `sequence`.
    pub fn rewrite_with_analysis(
        &self,
        sequence: &Sequence,
        target: OptimizationTarget,
        report: &AnalysisReport,
    ) -> RewriteReport {
        let _guard = self.span.enter();

        if sequence.is_empty() {
            return RewriteReport {
                target,
                strategy: Strategy::Identity,
                sequence: Sequence::new(),
                candidates: Vec::new(),
            };
        }

        let candidates = match target {
            OptimizationTarget::Auto => {
                let (strategy, rewritten) = self.auto(sequence.as_slice(), report);
                vec![self.scorer.candidate(strategy, rewritten, sequence, target)]
            }
            _ => {
                let direct = self.apply_target(sequence.as_slice(), target);
                vec![
                    self.scorer
                        .candidate(Strategy::Direct, direct, sequence, target),
                    self.scorer
                        .candidate(Strategy::Identity, sequence.clone(), sequence, target),
                ]
            }
        };

        let winner = best_index(&candidates).unwrap_or_default();
        let chosen = &candidates[winner];

        debug!(
            target = %target,
            strategy = ?chosen.strategy,
            before = sequence.len(),
            after = chosen.sequence.len(),
            score = chosen.score,
            "sequence rewritten"
        );

        RewriteReport {
            target,
            strategy: chosen.strategy,
            sequence: chosen.sequence.clone(),
            candidates,
        }
    }

    /// Replace compression markers with the commands they stand for.
    pub fn expand_markers(&self, sequence: &Sequence) -> Sequence {
        passes::expand_markers(sequence.as_slice()).into()
    }

    // -- Private helpers ----------------------------------------------------

    fn apply_target(&self, commands: &[Command], target: OptimizationTarget) -> Sequence {
        match target {
            OptimizationTarget::Speed => self.speed(commands),
            OptimizationTarget::Accuracy => self.accuracy(commands),
            OptimizationTarget::Memory => self.memory(commands),
            OptimizationTarget::Auto => commands.to_vec(),
        }
        .into()
    }

    fn speed(&self, commands: &[Command]) -> Vec<Command> {
        let cancelled = passes::cancel_pairs(commands, &self.config.cancellation_pairs);
        passes::fuse_rotations(&cancelled, &self.config.fusable_axes, &self.angles)
    }

    fn accuracy(&self, commands: &[Command]) -> Vec<Command> {
        let marked = passes::insert_corrections(
            commands,
            self.config.correction_interval,
            &self.correction_marker,
        );
        passes::substitute_where(&marked, &self.refine, |c| self.is_rotation(c))
    }

    fn memory(&self, commands: &[Command]) -> Vec<Command> {
        let coarse = passes::substitute_where(commands, &self.coarsen, |c| self.is_rotation(c));
        passes::substitute_where(&coarse, &self.compact, |_| true)
    }

    fn auto(&self, commands: &[Command], report: &AnalysisReport) -> (Strategy, Sequence) {
        if !report.motif_hits.is_empty() {
            let templates: HashMap<&str, Option<&[String]>> = self
                .analyzer
                .motifs()
                .iter()
                .map(|m| (m.name.as_str(), m.template.as_deref()))
                .collect();
            let rewritten = passes::instantiate_motifs(commands, report, |hit: &MotifHit, window| {
                match templates.get(hit.name.as_str()).copied().flatten() {
                    Some(template) => self.templates.instantiate(template, window),
                    None => passes::fuse_similar(window, &self.analyzer),
                }
            });
            return (Strategy::MotifTemplates, rewritten.into());
        }

        if !report.repeated_subsequences.is_empty() {
            let rewritten =
                passes::compress_repeats(commands, report, self.config.compression_max_len);
            return (Strategy::Compression, rewritten.into());
        }

        if !report.similarity_runs.is_empty() {
            return (Strategy::RunFusion, passes::fuse_runs(commands, report).into());
        }

        (Strategy::Identity, commands.to_vec().into())
    }

    fn is_rotation(&self, command: &Command) -> bool {
        let op = command.op_name();
        self.analyzer.is_rotation(op) || self.config.fusable_axes.iter().any(|a| a == op)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;

    fn rewriter() -> SequenceRewriter {
        let analyzer = PatternAnalyzer::new(&AnalyzerConfig::default());
        SequenceRewriter::new(analyzer, &RewriteConfig::default()).unwrap()
    }

    fn seq(items: &[&str]) -> Sequence {
        Sequence::from_strs(items.iter().copied()).unwrap()
    }

    #[test]
    fn speed_removes_both_cancelling_pairs() {
        let out = rewriter().rewrite(
            &seq(&["H(q[0])", "H(q[0])", "X(q[1])", "X(q[1])"]),
            OptimizationTarget::Speed,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn speed_strictly_shortens_when_a_pair_exists() {
        let input = seq(&["CNOT(q[0], q[1])", "Z(q[2])", "Z(q[2])", "measure(q[0])"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Speed);
        assert!(out.len() < input.len());
        assert_eq!(out.to_strs(), vec!["CNOT(q[0], q[1])", "measure(q[0])"]);
    }

    #[test]
    fn accuracy_inserts_markers_and_refines() {
        let input = seq(&["Rx(pi/2, q[0])", "b", "c", "d", "e", "f"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Accuracy);
        assert_eq!(
            out.to_strs(),
            vec!["Rx(pi/4, q[0])", "b", "c", "d", "e", "apply_error_correction()", "f"]
        );
    }

    #[test]
    fn memory_coarsens_and_compacts() {
        let input = seq(&["Rz(pi/16, q[0])", "Hadamard_Gate(q[1])", "measure(q[0])"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Memory);
        assert_eq!(out.to_strs(), vec!["Rz(pi/8, q[0])", "H(q[1])", "measure(q[0])"]);
    }

    #[test]
    fn precision_tokens_outside_rotations_are_left_alone() {
        let input = seq(&["label(pi/16)", "note", "x"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Memory);
        assert_eq!(out, input);
    }

    #[test]
    fn auto_leaves_unstructured_sequences_unchanged() {
        let input = seq(&["H(q[0])", "CNOT(q[0], q[1])", "measure(q[1])"]);
        let report = rewriter().rewrite_with_report(&input, OptimizationTarget::Auto);
        assert_eq!(report.sequence, input);
        assert_eq!(report.strategy, Strategy::Identity);
    }

    #[test]
    fn auto_prefers_motif_templates() {
        let input = seq(&["Rx(pi/2, q[0])", "Ry(pi/4, q[0])", "Rz(pi, q[0])", "measure(q[0])"]);
        let report = rewriter().rewrite_with_report(&input, OptimizationTarget::Auto);
        assert_eq!(report.strategy, Strategy::MotifTemplates);
        assert_eq!(
            report.sequence.to_strs(),
            vec!["U3(pi/2, q[0] | pi/4, q[0] | pi, q[0])", "measure(q[0])"]
        );
    }

    #[test]
    fn auto_motif_without_template_fuses_similar_commands() {
        let input = seq(&["H(q[0])", "H(q[1])", "measure(q[0])"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Auto);
        assert_eq!(out.to_strs(), vec!["H(q[0] | q[1])", "measure(q[0])"]);
    }

    #[test]
    fn auto_compresses_repeats() {
        let input = seq(&["A(1)", "B(2)", "C(3)", "A(1)", "B(2)", "C(3)", "D(4)"]);
        let report = rewriter().rewrite_with_report(&input, OptimizationTarget::Auto);
        assert_eq!(report.strategy, Strategy::Compression);
        assert_eq!(
            report.sequence.to_strs(),
            vec![
                "COMPRESSED[3:A(1)|B(2)|C(3)]",
                "COMPRESSED[3:A(1)|B(2)|C(3)]",
                "D(4)"
            ]
        );
        assert_eq!(rewriter().expand_markers(&report.sequence), input);
    }

    #[test]
    fn auto_falls_back_to_run_fusion() {
        let input = seq(&["measure(q[0])", "measure(q[1])", "H(q[0])"]);
        let report = rewriter().rewrite_with_report(&input, OptimizationTarget::Auto);
        assert_eq!(report.strategy, Strategy::RunFusion);
        assert_eq!(report.sequence.to_strs(), vec!["measure(q[0] | q[1])", "H(q[0])"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let r = rewriter();
        for target in OptimizationTarget::ALL {
            assert!(r.rewrite(&Sequence::new(), target).is_empty());
        }
    }

    #[test]
    fn unknown_target_name_is_rejected() {
        let err = rewriter()
            .rewrite_named(&seq(&["H(q[0])"]), "turbo")
            .unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedTarget { .. }));
    }

    #[test]
    fn report_lists_all_candidates() {
        let report =
            rewriter().rewrite_with_report(&seq(&["X(q[0])", "X(q[0])"]), OptimizationTarget::Speed);
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.strategy, Strategy::Direct);
        assert!(report.sequence.is_empty());
    }

    #[test]
    fn speed_keeps_rotations_on_different_axes() {
        let input = seq(&["Rx(pi/2, q[0])", "Ry(pi/4, q[0])"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Speed);
        assert_eq!(out, input);
    }

    #[test]
    fn speed_keeps_gates_on_different_qubits() {
        let input = seq(&["H(q[0])", "H(q[1])"]);
        assert_eq!(rewriter().rewrite(&input, OptimizationTarget::Speed), input);
    }

    #[test]
    fn named_targets_never_compress_repeated_blocks() {
        let input = seq(&["A(1)", "B(2)", "A(1)", "B(2)"]);
        let r = rewriter();
        assert_eq!(r.rewrite(&input, OptimizationTarget::Speed), input);
        assert_eq!(r.rewrite(&input, OptimizationTarget::Memory), input);
        assert!(
            r.rewrite(&input, OptimizationTarget::Accuracy)
                .iter()
                .all(|c| !c.as_str().starts_with(COMPRESSED_PREFIX))
        );
    }

    #[test]
    fn memory_keeps_separate_measurements() {
        let input = seq(&["measure(q[0])", "measure(q[1])"]);
        assert_eq!(rewriter().rewrite(&input, OptimizationTarget::Memory), input);
    }

    #[test]
    fn accuracy_marks_long_repeated_blocks() {
        let input = seq(&["A(1)", "B(2)", "C(3)", "A(1)", "B(2)", "C(3)"]);
        let out = rewriter().rewrite(&input, OptimizationTarget::Accuracy);
        assert_eq!(
            out.to_strs(),
            vec!["A(1)", "B(2)", "C(3)", "A(1)", "B(2)", "apply_error_correction()", "C(3)"]
        );
    }

    #[test]
    fn bad_template_reference_fails_construction() {
        let mut analyzer_config = AnalyzerConfig::default();
        analyzer_config.motifs[0].template = Some(vec!["{7}".to_string()]);
        let analyzer = PatternAnalyzer::new(&analyzer_config);
        assert!(SequenceRewriter::new(analyzer, &RewriteConfig::default()).is_err());
    }
}
