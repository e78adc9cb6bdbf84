//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, configuration loading, sequence input
//! and output formatting.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use cmdseq_kernel::{AnalysisReport, PipelineConfig, Sequence};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::InputArgs;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load the pipeline configuration from `path`, or the defaults when no
/// path is given.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let config = PipelineConfig::load(path)
        .with_context(|| format!("failed to load config file {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Read a sequence from the positional argument, `--file`, or stdin.
pub fn read_sequence(input: &InputArgs) -> Result<Sequence> {
    let text = match (&input.sequence, &input.file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sequence file {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read sequence from stdin")?;
            buf
        }
    };
    parse_sequence(&text)
}

/// Parse a JSON array of command strings.
pub fn parse_sequence(text: &str) -> Result<Sequence> {
    Sequence::parse_json(text.trim()).context("input must be a JSON array of non-empty strings")
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// One command per line, indented.
pub fn format_sequence(sequence: &Sequence) -> String {
    if sequence.is_empty() {
        return "    (empty)".to_string();
    }
    sequence
        .iter()
        .map(|c| format!("    {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable summary of an analysis report.
pub fn format_analysis(report: &AnalysisReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "  Repeated subsequences: {}\n",
        report.repeated_subsequences.len()
    ));
    for repeat in &report.repeated_subsequences {
        out.push_str(&format!(
            "    [{}] x{} at {:?}  ratio {:.2}\n",
            repeat.pattern.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
            repeat.frequency(),
            repeat.positions,
            repeat.compression_ratio,
        ));
    }

    out.push_str(&format!("  Motifs: {}\n", report.motif_hits.len()));
    for hit in &report.motif_hits {
        out.push_str(&format!(
            "    {} ({:?}) at {} len {}  score {:.2}\n",
            hit.name, hit.kind, hit.position, hit.length, hit.score
        ));
    }

    out.push_str(&format!("  Similarity runs: {}\n", report.similarity_runs.len()));
    for run in &report.similarity_runs {
        out.push_str(&format!("    {}..{} ({} commands)\n", run.start, run.end(), run.len()));
    }

    out.push_str(&format!(
        "  Compression candidates: {}\n",
        report.compression_candidates.len()
    ));
    for candidate in &report.compression_candidates {
        out.push_str(&format!(
            "    {:?} at {:?} len {}  saves ~{:.1}\n",
            candidate.kind, candidate.positions, candidate.length, candidate.estimated_savings
        ));
    }

    out
}

/// Built-in sequences used by the `demo` subcommand.
pub fn demo_sequences() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            "bell pair",
            vec!["H(q[0])", "CNOT(q[0], q[1])", "measure(q[0])", "measure(q[1])"],
        ),
        (
            "redundant gates",
            vec!["H(q[0])", "H(q[0])", "X(q[1])", "X(q[1])", "Z(q[2])"],
        ),
        (
            "rotation chain",
            vec![
                "Rx(pi/2, q[0])",
                "Ry(pi/4, q[0])",
                "Rz(pi/8, q[0])",
                "Rz(pi/8, q[0])",
            ],
        ),
        (
            "repeated block",
            vec![
                "prepare(q[0])",
                "entangle(q[0], q[1])",
                "prepare(q[0])",
                "entangle(q[0], q[1])",
                "measure(q[1])",
            ],
        ),
        (
            "long names",
            vec!["hadamard_gate(q[0])", "cnot_gate(q[0], q[1])", "pauli_x(q[1])"],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
