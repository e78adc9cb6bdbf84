//! Typed pipeline configuration.
//!
//! Every recognized knob is an explicit field.  Unknown keys are rejected so
//! that a typo in a TOML file fails loudly instead of silently falling back
//! to a default.
//!
//! ```toml
//! [cache]
//! capacity = 500
//! ttl_secs = 600
//!
//! [rewrite]
//! target = "speed"
//! correction_interval = 4
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::target::OptimizationTarget;

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Configuration for the whole cache → analyze → rewrite pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    pub analyzer: AnalyzerConfig,
    pub rewrite: RewriteConfig,
    pub signature: SignatureConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document.  Missing sections take their
    /// defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KernelError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.analyzer.validate()?;
        self.rewrite.validate()?;
        self.signature.validate()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Content-addressed cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Hard upper bound on stored entries.
    pub capacity: usize,
    /// Entry lifetime in seconds.  `0` expires entries immediately.
    pub ttl_secs: u64,
    /// Bound on memoized analysis reports kept by the engine.
    pub analysis_memo_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 3600,
            analysis_memo_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(KernelError::invalid_config(
                "cache.capacity",
                "capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Which phase of a program a motif usually belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifKind {
    Initialization,
    Evolution,
}

/// A short, fixed pattern of operation names matched verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Motif {
    pub name: String,
    pub kind: MotifKind,
    /// Operation names, compared exactly against [`Command::op_name`].
    ///
    /// [`Command::op_name`]: crate::sequence::Command::op_name
    pub ops: Vec<String>,
    /// Reutilization score in `0.0..=1.0`; higher wins when occurrences
    /// start at the same position.
    pub score: f64,
    /// Replacement commands.  `{N}` expands to the N-th matched command,
    /// `{N.op}` to its operation name and `{N.args}` to its argument text.
    /// Without a template the matched commands are fused pairwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Vec<String>>,
}

impl Motif {
    fn new(name: &str, kind: MotifKind, ops: &[&str], score: f64) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ops: ops.iter().map(|op| op.to_string()).collect(),
            score,
            template: None,
        }
    }

    fn with_template(mut self, template: &[&str]) -> Self {
        self.template = Some(template.iter().map(|t| t.to_string()).collect());
        self
    }
}

/// Pattern analyzer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Shortest window reported as a repeated subsequence.
    pub min_repeat_len: usize,
    /// Operation names that count as similar to each other.
    pub rotation_family: Vec<String>,
    /// Fixed motif catalog.
    pub motifs: Vec<Motif>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        use MotifKind::{Evolution, Initialization};

        Self {
            min_repeat_len: 2,
            rotation_family: ["Rx", "Ry", "Rz", "U3"].map(String::from).to_vec(),
            motifs: vec![
                Motif::new("bell_pair", Initialization, &["H", "CNOT", "H"], 0.8),
                Motif::new("double_hadamard", Initialization, &["H", "H"], 0.8),
                Motif::new("flipped_superposition", Initialization, &["X", "H"], 0.8),
                Motif::new("full_rotation", Evolution, &["Rx", "Ry", "Rz"], 0.7)
                    .with_template(&["U3({0.args} | {1.args} | {2.args})"]),
                Motif::new("double_rz", Evolution, &["Rz", "Rz"], 0.7),
                Motif::new("double_u3", Evolution, &["U3", "U3"], 0.7),
            ],
        }
    }
}

impl AnalyzerConfig {
    fn validate(&self) -> Result<()> {
        if self.min_repeat_len < 2 {
            return Err(KernelError::invalid_config(
                "analyzer.min_repeat_len",
                "windows shorter than 2 commands are not patterns",
            ));
        }
        for motif in &self.motifs {
            if !(2..=3).contains(&motif.ops.len()) {
                return Err(KernelError::invalid_config(
                    "analyzer.motifs",
                    format!("motif `{}` must have 2 or 3 operations", motif.name),
                ));
            }
            if !(0.0..=1.0).contains(&motif.score) {
                return Err(KernelError::invalid_config(
                    "analyzer.motifs",
                    format!("motif `{}` score must lie in 0.0..=1.0", motif.name),
                ));
            }
            if motif.template.as_ref().is_some_and(|t| t.iter().any(|c| c.trim().is_empty())) {
                return Err(KernelError::invalid_config(
                    "analyzer.motifs",
                    format!("motif `{}` template contains a blank command", motif.name),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// A pair of precision tokens, coarse and fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrecisionStep {
    pub coarse: String,
    pub fine: String,
}

/// A long operation name and its short equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameMapping {
    pub long: String,
    pub short: String,
}

/// Sequence rewriter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Target used when the caller does not name one.
    pub target: OptimizationTarget,
    /// A correction marker is inserted after this many commands.
    pub correction_interval: usize,
    pub correction_marker: String,
    /// Operation-name pairs that cancel when adjacent with equal arguments.
    /// Matching is symmetric.
    pub cancellation_pairs: Vec<[String; 2]>,
    /// Rotation axes whose adjacent applications are fused.
    pub fusable_axes: Vec<String>,
    /// Angle (radians) assumed for a rotation whose angle cannot be parsed.
    pub placeholder_angle: f64,
    pub precision_steps: Vec<PrecisionStep>,
    pub compact_names: Vec<NameMapping>,
    /// Longest repeated pattern folded into one compression marker.
    pub compression_max_len: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        let pairs = [
            ("X", "X"),
            ("Y", "Y"),
            ("Z", "Z"),
            ("H", "H"),
            ("CNOT", "CNOT"),
            ("S", "S†"),
            ("T", "T†"),
        ];
        let steps = [("pi/2", "pi/4"), ("pi/4", "pi/8"), ("pi/8", "pi/16")];
        let names = [
            ("hadamard_gate", "H"),
            ("cnot_gate", "CNOT"),
            ("pauli_x", "X"),
            ("pauli_y", "Y"),
            ("pauli_z", "Z"),
        ];

        Self {
            target: OptimizationTarget::Auto,
            correction_interval: 5,
            correction_marker: "apply_error_correction()".to_string(),
            cancellation_pairs: pairs
                .iter()
                .map(|(a, b)| [a.to_string(), b.to_string()])
                .collect(),
            fusable_axes: ["Rx", "Ry", "Rz"].map(String::from).to_vec(),
            placeholder_angle: std::f64::consts::FRAC_PI_4,
            precision_steps: steps
                .iter()
                .map(|(coarse, fine)| PrecisionStep {
                    coarse: coarse.to_string(),
                    fine: fine.to_string(),
                })
                .collect(),
            compact_names: names
                .iter()
                .map(|(long, short)| NameMapping {
                    long: long.to_string(),
                    short: short.to_string(),
                })
                .collect(),
            compression_max_len: 9,
        }
    }
}

impl RewriteConfig {
    fn validate(&self) -> Result<()> {
        if self.correction_interval == 0 {
            return Err(KernelError::invalid_config(
                "rewrite.correction_interval",
                "interval must be at least 1",
            ));
        }
        if self.correction_marker.trim().is_empty() {
            return Err(KernelError::invalid_config(
                "rewrite.correction_marker",
                "marker must not be blank",
            ));
        }
        if !self.placeholder_angle.is_finite() {
            return Err(KernelError::invalid_config(
                "rewrite.placeholder_angle",
                "angle must be finite",
            ));
        }
        if self
            .precision_steps
            .iter()
            .any(|s| s.coarse.is_empty() || s.fine.is_empty())
        {
            return Err(KernelError::invalid_config(
                "rewrite.precision_steps",
                "precision tokens must not be empty",
            ));
        }
        if self
            .compact_names
            .iter()
            .any(|m| m.long.is_empty() || m.short.trim().is_empty())
        {
            return Err(KernelError::invalid_config(
                "rewrite.compact_names",
                "names must not be empty",
            ));
        }
        if self.compression_max_len < 2 {
            return Err(KernelError::invalid_config(
                "rewrite.compression_max_len",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Keywords extracted from commands to build similarity signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignatureConfig {
    pub keywords: Vec<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            keywords: [
                "H", "CNOT", "X", "Y", "Z", "Rx", "Ry", "Rz", "QFT", "QOA", "QSA", "QPSO", "QML",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl SignatureConfig {
    fn validate(&self) -> Result<()> {
        if self.keywords.is_empty() {
            return Err(KernelError::invalid_config(
                "signature.keywords",
                "at least one keyword is required",
            ));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(KernelError::invalid_config(
                "signature.keywords",
                "keywords must not be blank",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [cache]
            capacity = 8

            [rewrite]
            target = "speed"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.rewrite.target, OptimizationTarget::Speed);
        assert_eq!(config.rewrite.correction_interval, 5);
        assert_eq!(config.analyzer.motifs.len(), 6);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_toml_str("[cache]\nsize = 3\n").unwrap_err();
        assert!(matches!(err, KernelError::TomlParse(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PipelineConfig::from_toml_str("[cache]\ncapacity = 0\n").unwrap_err();
        match err {
            KernelError::InvalidConfig { field, .. } => assert_eq!(field, "cache.capacity"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn motif_length_is_checked() {
        let mut config = PipelineConfig::default();
        config.analyzer.motifs.push(Motif::new(
            "too_long",
            MotifKind::Evolution,
            &["Rx", "Ry", "Rz", "U3"],
            0.5,
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_render_parses_back() {
        let config = PipelineConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
