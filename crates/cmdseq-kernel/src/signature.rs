//! Keyword signatures for similarity lookups.
//!
//! A signature is the set of known operation keywords that occur in a
//! sequence.  Keywords are found with a case-insensitive, leftmost-longest
//! [`aho_corasick`] automaton and only count when they stand as a whole word,
//! so `Rx(...)` yields `Rx` and not `X`, and `hadamard_gate` yields nothing.

use std::collections::BTreeSet;

use aho_corasick::{AhoCorasick, MatchKind};

use crate::config::SignatureConfig;
use crate::error::{KernelError, Result};
use crate::sequence::Sequence;

/// A set of canonical keyword spellings.
pub type Signature = BTreeSet<String>;

/// Extracts keyword signatures from sequences.
#[derive(Debug, Clone)]
pub struct SignatureExtractor {
    keywords: Vec<String>,
    automaton: AhoCorasick,
}

impl SignatureExtractor {
    /// Build an extractor for the given keyword list.
    pub fn new(keywords: &[String]) -> Result<Self> {
        if keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(KernelError::invalid_config(
                "signature.keywords",
                "keywords must not be blank",
            ));
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(keywords)
            .map_err(|e| KernelError::invalid_config("signature.keywords", e.to_string()))?;

        Ok(Self {
            keywords: keywords.to_vec(),
            automaton,
        })
    }

    /// Build an extractor from configuration.
    pub fn from_config(config: &SignatureConfig) -> Result<Self> {
        Self::new(&config.keywords)
    }

    /// Collect the keywords present anywhere in `sequence`.
    pub fn extract(&self, sequence: &Sequence) -> Signature {
        let mut signature = Signature::new();
        for command in sequence {
            self.extract_into(command.as_str(), &mut signature);
        }
        signature
    }

    fn extract_into(&self, text: &str, signature: &mut Signature) {
        for mat in self.automaton.find_iter(text) {
            if is_whole_word(text, mat.start(), mat.end()) {
                signature.insert(self.keywords[mat.pattern().as_usize()].clone());
            }
        }
    }
}

/// Jaccard similarity of two signatures, `None` when both are empty.
pub fn jaccard(a: &Signature, b: &Signature) -> Option<f64> {
    let union = a.union(b).count();
    if union == 0 {
        return None;
    }
    let intersection = a.intersection(b).count();
    Some(intersection as f64 / union as f64)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SignatureExtractor {
        SignatureExtractor::from_config(&SignatureConfig::default()).unwrap()
    }

    fn seq(items: &[&str]) -> Sequence {
        Sequence::from_strs(items.iter().copied()).unwrap()
    }

    #[test]
    fn extracts_whole_word_keywords() {
        let sig = extractor().extract(&seq(&["H(q[0])", "CNOT(q[0], q[1])", "Rx(pi/2, q[0])"]));
        let expected: Signature = ["CNOT", "H", "Rx"].map(String::from).into();
        assert_eq!(sig, expected);
    }

    #[test]
    fn ignores_keywords_inside_identifiers() {
        let sig = extractor().extract(&seq(&["hadamard_gate(q0)", "pauli_x(q1)"]));
        assert!(sig.is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let sig = extractor().extract(&seq(&["qft(q[0:4])", "cnot q0 q1"]));
        let expected: Signature = ["CNOT", "QFT"].map(String::from).into();
        assert_eq!(sig, expected);
    }

    #[test]
    fn jaccard_values() {
        let a: Signature = ["H", "X"].map(String::from).into();
        let b: Signature = ["H", "Y"].map(String::from).into();
        assert_eq!(jaccard(&a, &a), Some(1.0));
        assert!((jaccard(&a, &b).unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&Signature::new(), &Signature::new()), None);
    }
}
