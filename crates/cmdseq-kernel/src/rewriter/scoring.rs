//! Candidate scoring.
//!
//! A candidate's score is its length plus target-specific weights.  The
//! candidate with the **lowest** score wins; ties go to the candidate that
//! was produced first.
//!
//! Precision rewards only count commands that carry a fine token as a whole
//! word and do not already appear in the input, so untouched commands earn
//! nothing.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};

use crate::config::RewriteConfig;
use crate::error::{KernelError, Result};
use crate::sequence::{Command, Sequence};
use crate::signature::is_whole_word;
use crate::target::OptimizationTarget;

/// Penalty per correction marker when optimizing for speed.
const SPEED_MARKER_PENALTY: f64 = 2.0;
/// Reward per command carrying a fine precision token.
const ACCURACY_PRECISION_REWARD: f64 = 3.0;
/// Reward per correction marker when optimizing for accuracy.
const ACCURACY_MARKER_REWARD: f64 = 2.0;
/// Commands at least this long count as long-form under `memory`.
const MEMORY_LONG_COMMAND: usize = 10;
const MEMORY_LONG_PENALTY: f64 = 1.0;

/// How a candidate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The target pipeline applied to the input.
    Direct,
    /// The input, unchanged.
    Identity,
    /// Motif occurrences replaced by their templates.
    MotifTemplates,
    /// Repeated subsequences folded into markers.
    Compression,
    /// Similarity runs fused.
    RunFusion,
}

/// One scored rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteCandidate {
    pub strategy: Strategy,
    pub sequence: Sequence,
    pub score: f64,
}

/// Scores candidates for a given target.
#[derive(Debug, Clone)]
pub(crate) struct Scorer {
    correction_marker: String,
    fine_tokens: AhoCorasick,
}

impl Scorer {
    pub(crate) fn new(config: &RewriteConfig) -> Result<Self> {
        let fine_tokens = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(config.precision_steps.iter().map(|step| step.fine.as_str()))
            .map_err(|e| KernelError::invalid_config("rewrite.precision_steps", e.to_string()))?;

        Ok(Self {
            correction_marker: config.correction_marker.clone(),
            fine_tokens,
        })
    }

    /// Score `sequence` as a rewrite of `original`.
    pub(crate) fn score(
        &self,
        sequence: &Sequence,
        original: &Sequence,
        target: OptimizationTarget,
    ) -> f64 {
        let base = sequence.len() as f64;
        let markers = sequence
            .iter()
            .filter(|c| c.as_str() == self.correction_marker)
            .count() as f64;

        match target {
            OptimizationTarget::Speed => base + SPEED_MARKER_PENALTY * markers,
            OptimizationTarget::Accuracy => {
                let refined = self.refined_count(sequence, original) as f64;
                base - ACCURACY_PRECISION_REWARD * refined - ACCURACY_MARKER_REWARD * markers
            }
            OptimizationTarget::Memory => {
                let long = sequence
                    .iter()
                    .filter(|c| c.as_str().chars().count() >= MEMORY_LONG_COMMAND)
                    .count() as f64;
                base + MEMORY_LONG_PENALTY * long
            }
            OptimizationTarget::Auto => base,
        }
    }

    pub(crate) fn candidate(
        &self,
        strategy: Strategy,
        sequence: Sequence,
        original: &Sequence,
        target: OptimizationTarget,
    ) -> RewriteCandidate {
        let score = self.score(&sequence, original, target);
        RewriteCandidate {
            strategy,
            sequence,
            score,
        }
    }

    /// Commands of `sequence` with a fine token that `original` does not
    /// contain verbatim, counted as a multiset.
    fn refined_count(&self, sequence: &Sequence, original: &Sequence) -> usize {
        let mut unchanged: HashMap<&str, usize> = HashMap::new();
        for command in original {
            *unchanged.entry(command.as_str()).or_default() += 1;
        }

        sequence
            .iter()
            .filter(|command| match unchanged.get_mut(command.as_str()) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    false
                }
                _ => self.has_fine_token(command),
            })
            .count()
    }

    fn has_fine_token(&self, command: &Command) -> bool {
        let text = command.as_str();
        self.fine_tokens
            .find_iter(text)
            .any(|m| is_whole_word(text, m.start(), m.end()))
    }
}

/// Index of the lowest-scoring candidate; the first one wins ties.
pub(crate) fn best_index(candidates: &[RewriteCandidate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if best.is_none_or(|(_, score)| candidate.score < score) {
            best = Some((index, candidate.score));
        }
    }
    best.map(|(index, _)| index)
}
