//! CLI argument definitions for cmdseq.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// cmdseq -- cache, analyze and rewrite command sequences.
#[derive(Parser)]
#[command(
    name = "cmdseq",
    version,
    about = "cmdseq -- cache, analyze and rewrite command sequences",
    long_about = "Detects repeated subsequences, known motifs and runs of similar \
                  operations in command sequences, rewrites them toward a speed, \
                  accuracy, memory or auto target, and caches the results by content."
)]
pub struct Cli {
    /// Path to a TOML configuration file.  Defaults are used when omitted.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report repeated subsequences, motifs and similarity runs.
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a sequence toward an optimization target.
    Rewrite {
        #[command(flatten)]
        input: InputArgs,

        /// One of `speed`, `accuracy`, `memory`, `auto`.  Defaults to the
        /// configured target.
        #[arg(long, short)]
        target: Option<String>,

        /// Print every scored candidate as JSON.
        #[arg(long)]
        report: bool,

        /// Replace compression markers in the input with the commands they
        /// stand for instead of rewriting.
        #[arg(long, conflicts_with_all = ["target", "report"])]
        expand: bool,
    },

    /// Run the full cache, analyze and rewrite pipeline.
    Minimize {
        #[command(flatten)]
        input: InputArgs,

        /// One of `speed`, `accuracy`, `memory`, `auto`.  An unknown target
        /// returns the input unchanged.
        #[arg(long, short)]
        target: Option<String>,

        /// Run the pipeline this many times to exercise the cache.
        #[arg(long, default_value_t = 1)]
        repeat: usize,

        /// Print the final report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Minimize a set of built-in sample sequences with every target.
    Demo,

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where a sequence comes from.
#[derive(Args)]
pub struct InputArgs {
    /// JSON array of command strings, e.g. '["H(q[0])", "H(q[0])"]'.
    /// Read from stdin when neither this nor `--file` is given.
    pub sequence: Option<String>,

    /// Read the JSON array from a file.
    #[arg(long, short, conflicts_with = "sequence")]
    pub file: Option<PathBuf>,
}

/// Actions for inspecting configuration.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the built-in defaults as TOML.
    Defaults,
    /// Validate the configuration and report problems.
    Check,
}
