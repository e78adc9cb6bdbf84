//! Pattern analyzer.
//!
//! Scans a single sequence for three kinds of structure:
//!
//! | Pattern | Match rule |
//! |---------|------------|
//! | Repeated subsequence | identical window (by value) seen at two or more positions |
//! | Motif | fixed catalog entry matched against operation names |
//! | Similarity run | adjacent commands with the same operation name or from the rotation family |
//!
//! Repeated subsequences are reported for every window length, so a
//! repetition of length 4 also shows up as its length-2 and length-3
//! sub-windows.  Downstream rewriting picks the longest pattern at each
//! position, so the extra entries never shorten a compression.
//!
//! Analysis is deterministic and order-preserving.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{Span, debug, debug_span};

use crate::config::{AnalyzerConfig, Motif, MotifKind};
use crate::sequence::{Command, Sequence};

/// Estimated saving per command folded out of a similarity run.
const SIMILAR_RUN_SAVING: f64 = 0.3;

/// Estimated saving per repeated command folded into a marker.
const REPETITION_SAVING: f64 = 0.4;

/// Shortest similarity run considered for compression.
const MIN_COMPRESSIBLE_RUN: usize = 3;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// A window of commands that occurs more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedSubsequence {
    pub pattern: Vec<Command>,
    /// Start index of every occurrence, ascending.
    pub positions: Vec<usize>,
    pub length: usize,
    /// `1 - (distinct + 2) / length`, floored at zero.
    pub compression_ratio: f64,
}

impl RepeatedSubsequence {
    /// How many times the window occurs.
    pub fn frequency(&self) -> usize {
        self.positions.len()
    }
}

/// One occurrence of a catalog motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifHit {
    pub name: String,
    pub kind: MotifKind,
    pub position: usize,
    pub length: usize,
    pub score: f64,
}

/// A maximal run of adjacent similar commands (length >= 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRun {
    pub start: usize,
    pub commands: Vec<Command>,
}

impl SimilarityRun {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Index one past the last command of the run.
    pub fn end(&self) -> usize {
        self.start + self.commands.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    SimilarOperations,
    Repetitive,
}

/// A region the rewriter could shrink, with a rough saving estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionCandidate {
    pub kind: CompressionKind,
    pub positions: Vec<usize>,
    pub length: usize,
    pub estimated_savings: f64,
}

/// Everything the analyzer found in one sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub repeated_subsequences: Vec<RepeatedSubsequence>,
    pub motif_hits: Vec<MotifHit>,
    pub similarity_runs: Vec<SimilarityRun>,
    pub compression_candidates: Vec<CompressionCandidate>,
}

impl AnalysisReport {
    /// True when no pattern of any kind was found.
    pub fn is_empty(&self) -> bool {
        self.repeated_subsequences.is_empty()
            && self.motif_hits.is_empty()
            && self.similarity_runs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Stateless pattern detector.  Cheap to clone; share freely.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    min_repeat_len: usize,
    motifs: Vec<Motif>,
    rotation_family: HashSet<String>,
    span: Span,
}

impl PatternAnalyzer {
    /// Create an analyzer logging under a default `pattern_analyzer` span.
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_span(config, debug_span!("pattern_analyzer"))
    }

    /// Create an analyzer whose events are recorded under `span`.
    ///
    /// Motifs without operations are ignored.
    pub fn with_span(config: &AnalyzerConfig, span: Span) -> Self {
        Self {
            min_repeat_len: config.min_repeat_len.max(1),
            motifs: config
                .motifs
                .iter()
                .filter(|m| !m.ops.is_empty())
                .cloned()
                .collect(),
            rotation_family: config.rotation_family.iter().cloned().collect(),
            span,
        }
    }

    /// The motif catalog in use.
    pub fn motifs(&self) -> &[Motif] {
        &self.motifs
    }

    /// Look up a catalog motif by name.
    pub fn motif(&self, name: &str) -> Option<&Motif> {
        self.motifs.iter().find(|m| m.name == name)
    }

    /// Analyze one sequence.
    pub fn analyze(&self, sequence: &Sequence) -> AnalysisReport {
        let _guard = self.span.enter();
        let commands = sequence.as_slice();

        let repeated_subsequences = self.find_repeated(commands);
        let motif_hits = self.find_motifs(commands);
        let similarity_runs = self.find_similarity_runs(commands);
        let compression_candidates =
            compression_candidates(&repeated_subsequences, &similarity_runs);

        debug!(
            len = commands.len(),
            repeated = repeated_subsequences.len(),
            motifs = motif_hits.len(),
            runs = similarity_runs.len(),
            "sequence analyzed"
        );

        AnalysisReport {
            repeated_subsequences,
            motif_hits,
            similarity_runs,
            compression_candidates,
        }
    }

    /// Whether two commands belong to the same operation family.
    pub fn are_similar(&self, a: &Command, b: &Command) -> bool {
        let (a, b) = (a.op_name(), b.op_name());
        a == b || (self.rotation_family.contains(a) && self.rotation_family.contains(b))
    }

    /// Whether `op` names a member of the rotation family.
    pub fn is_rotation(&self, op: &str) -> bool {
        self.rotation_family.contains(op)
    }

    // -- Private helpers ----------------------------------------------------

    fn find_repeated(&self, commands: &[Command]) -> Vec<RepeatedSubsequence> {
        let n = commands.len();
        let mut repeated = Vec::new();

        for length in self.min_repeat_len..=n / 2 {
            // First-seen order keeps the output deterministic.
            let mut order: Vec<&[Command]> = Vec::new();
            let mut seen: HashMap<&[Command], Vec<usize>> = HashMap::new();

            for (start, window) in commands.windows(length).enumerate() {
                match seen.entry(window) {
                    Entry::Occupied(mut e) => e.get_mut().push(start),
                    Entry::Vacant(e) => {
                        e.insert(vec![start]);
                        order.push(window);
                    }
                }
            }

            for window in order {
                let Some(positions) = seen.remove(window) else {
                    continue;
                };
                if positions.len() < 2 {
                    continue;
                }
                repeated.push(RepeatedSubsequence {
                    pattern: window.to_vec(),
                    positions,
                    length,
                    compression_ratio: compression_ratio(window),
                });
            }
        }

        repeated
    }

    fn find_motifs(&self, commands: &[Command]) -> Vec<MotifHit> {
        let names: Vec<&str> = commands.iter().map(Command::op_name).collect();
        let mut hits = Vec::new();

        for position in 0..names.len() {
            for motif in &self.motifs {
                let end = position + motif.ops.len();
                if end > names.len() {
                    continue;
                }
                let matched = names[position..end]
                    .iter()
                    .zip(&motif.ops)
                    .all(|(name, op)| *name == op.as_str());
                if matched {
                    hits.push(MotifHit {
                        name: motif.name.clone(),
                        kind: motif.kind,
                        position,
                        length: motif.ops.len(),
                        score: motif.score,
                    });
                }
            }
        }

        hits
    }

    fn find_similarity_runs(&self, commands: &[Command]) -> Vec<SimilarityRun> {
        let mut runs = Vec::new();
        let mut start = 0;

        for index in 1..=commands.len() {
            let continues =
                index < commands.len() && self.are_similar(&commands[index - 1], &commands[index]);
            if continues {
                continue;
            }
            if index - start >= 2 {
                runs.push(SimilarityRun {
                    start,
                    commands: commands[start..index].to_vec(),
                });
            }
            start = index;
        }

        runs
    }
}

fn compression_ratio(window: &[Command]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&Command> = window.iter().collect();
    let compressed = distinct.len() + 2;
    (1.0 - compressed as f64 / window.len() as f64).max(0.0)
}

fn compression_candidates(
    repeated: &[RepeatedSubsequence],
    runs: &[SimilarityRun],
) -> Vec<CompressionCandidate> {
    let similar = runs
        .iter()
        .filter(|run| run.len() >= MIN_COMPRESSIBLE_RUN)
        .map(|run| CompressionCandidate {
            kind: CompressionKind::SimilarOperations,
            positions: vec![run.start],
            length: run.len(),
            estimated_savings: run.len() as f64 * SIMILAR_RUN_SAVING,
        });

    let repetitive = repeated.iter().map(|rep| CompressionCandidate {
        kind: CompressionKind::Repetitive,
        positions: rep.positions.clone(),
        length: rep.length,
        estimated_savings: (rep.frequency() - 1) as f64 * rep.length as f64 * REPETITION_SAVING,
    });

    similar.chain(repetitive).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> PatternAnalyzer {
        PatternAnalyzer::new(&AnalyzerConfig::default())
    }

    fn seq(items: &[&str]) -> Sequence {
        Sequence::from_strs(items.iter().copied()).unwrap()
    }

    #[test]
    fn repeated_pair_reports_both_positions() {
        let report = analyzer().analyze(&seq(&["A(1)", "B(2)", "A(1)", "B(2)"]));

        assert_eq!(report.repeated_subsequences.len(), 1);
        let hit = &report.repeated_subsequences[0];
        assert_eq!(hit.pattern, seq(&["A(1)", "B(2)"]).into_commands());
        assert_eq!(hit.positions, vec![0, 2]);
        assert_eq!(hit.length, 2);
        assert_eq!(hit.frequency(), 2);
    }

    #[test]
    fn repeats_are_kept_at_every_length() {
        let report = analyzer().analyze(&seq(&["A", "B", "C", "A", "B", "C"]));
        let lengths: Vec<usize> = report.repeated_subsequences.iter().map(|r| r.length).collect();
        // AB, BC at length 2 and ABC at length 3.
        assert_eq!(lengths, vec![2, 2, 3]);
        assert_eq!(report.repeated_subsequences[2].positions, vec![0, 3]);
    }

    #[test]
    fn min_repeat_len_is_respected() {
        let config = AnalyzerConfig {
            min_repeat_len: 3,
            ..AnalyzerConfig::default()
        };
        let report = PatternAnalyzer::new(&config).analyze(&seq(&["A(1)", "B(2)", "A(1)", "B(2)"]));
        assert!(report.repeated_subsequences.is_empty());
    }

    #[test]
    fn motifs_match_operation_names() {
        let report = analyzer().analyze(&seq(&["H(q[0])", "CNOT(q[0], q[1])", "H(q[0])"]));
        let names: Vec<&str> = report.motif_hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["bell_pair"]);
        assert_eq!(report.motif_hits[0].position, 0);
        assert_eq!(report.motif_hits[0].kind, MotifKind::Initialization);
    }

    #[test]
    fn every_motif_occurrence_is_reported() {
        let report = analyzer().analyze(&seq(&["Rz(a)", "Rz(b)", "Rz(c)"]));
        let positions: Vec<usize> = report
            .motif_hits
            .iter()
            .filter(|h| h.name == "double_rz")
            .map(|h| h.position)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn similarity_runs_group_rotations() {
        let report = analyzer().analyze(&seq(&[
            "H(q[0])",
            "Rx(pi/2, q[0])",
            "Ry(pi/4, q[1])",
            "U3(a, b, c)",
            "measure(q[0])",
            "measure(q[1])",
        ]));
        assert_eq!(report.similarity_runs.len(), 2);
        assert_eq!(report.similarity_runs[0].start, 1);
        assert_eq!(report.similarity_runs[0].len(), 3);
        assert_eq!(report.similarity_runs[1].start, 4);
        assert_eq!(report.similarity_runs[1].end(), 6);
    }

    #[test]
    fn compression_candidates_cover_runs_and_repeats() {
        let report = analyzer().analyze(&seq(&["Rx(a)", "Ry(b)", "Rz(c)", "M", "N", "M", "N"]));
        let kinds: Vec<CompressionKind> =
            report.compression_candidates.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&CompressionKind::SimilarOperations));
        assert!(kinds.contains(&CompressionKind::Repetitive));
    }

    #[test]
    fn unstructured_sequence_yields_empty_report() {
        let report = analyzer().analyze(&seq(&["H(q[0])", "CNOT(q[0], q[1])", "measure(q[1])"]));
        assert!(report.is_empty());
        assert!(analyzer().analyze(&Sequence::new()).is_empty());
    }

    #[test]
    fn analysis_is_deterministic() {
        let input = seq(&["A", "B", "A", "B", "Rz(1)", "Rz(2)", "A", "B"]);
        assert_eq!(analyzer().analyze(&input), analyzer().analyze(&input));
    }
}
