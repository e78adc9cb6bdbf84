//! CLI entry point for cmdseq.
//!
//! This binary provides the `cmdseq` command with subcommands for analyzing,
//! rewriting and minimizing command sequences, a demo run, and configuration
//! inspection.

mod cli;
mod helpers;

use anyhow::{Context, Result};
use clap::Parser;
use cmdseq_engine::Minimizer;
use cmdseq_kernel::{OptimizationTarget, PatternAnalyzer, PipelineConfig, Sequence, SequenceRewriter};
use tracing::info;

use cli::{Cli, Commands, ConfigAction, InputArgs};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    helpers::init_tracing(if cli.verbose { "debug" } else { "info" }, cli.log_json);

    let config = helpers::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input, json } => cmd_analyze(&config, &input, json),
        Commands::Rewrite {
            input,
            target,
            report,
            expand,
        } => cmd_rewrite(&config, &input, target.as_deref(), report, expand),
        Commands::Minimize {
            input,
            target,
            repeat,
            json,
        } => cmd_minimize(&config, &input, target.as_deref(), repeat, json),
        Commands::Demo => cmd_demo(&config),
        Commands::Config { action } => cmd_config(&config, action),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: analyze
// ---------------------------------------------------------------------------

fn cmd_analyze(config: &PipelineConfig, input: &InputArgs, json: bool) -> Result<()> {
    let sequence = helpers::read_sequence(input)?;
    let report = PatternAnalyzer::new(&config.analyzer).analyze(&sequence);

    if json {
        return helpers::print_json(&report);
    }

    println!();
    println!("  Analysis ({} commands)", sequence.len());
    println!("  ========");
    println!();
    print!("{}", helpers::format_analysis(&report));
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: rewrite
// ---------------------------------------------------------------------------

fn cmd_rewrite(
    config: &PipelineConfig,
    input: &InputArgs,
    target: Option<&str>,
    report: bool,
    expand: bool,
) -> Result<()> {
    let sequence = helpers::read_sequence(input)?;
    let rewriter = SequenceRewriter::new(PatternAnalyzer::new(&config.analyzer), &config.rewrite)
        .context("failed to build rewriter")?;

    if expand {
        return helpers::print_json(&rewriter.expand_markers(&sequence));
    }

    let target = match target {
        Some(name) => name.parse::<OptimizationTarget>()?,
        None => rewriter.default_target(),
    };
    let outcome = rewriter.rewrite_with_report(&sequence, target);
    info!(target = %target, strategy = ?outcome.strategy, "rewrite finished");

    if report {
        helpers::print_json(&outcome)
    } else {
        helpers::print_json(&outcome.sequence)
    }
}

// ---------------------------------------------------------------------------
// Subcommand: minimize
// ---------------------------------------------------------------------------

fn cmd_minimize(
    config: &PipelineConfig,
    input: &InputArgs,
    target: Option<&str>,
    repeat: usize,
    json: bool,
) -> Result<()> {
    let sequence = helpers::read_sequence(input)?;
    let minimizer = Minimizer::from_config(config).context("failed to build minimizer")?;
    let target = target
        .map(str::to_string)
        .unwrap_or_else(|| minimizer.rewriter().default_target().to_string());

    let mut last = None;
    for _ in 0..repeat.max(1) {
        last = Some(minimizer.minimize_named(&sequence, &target));
    }
    let Some(report) = last else {
        return Ok(());
    };

    if json {
        return helpers::print_json(&report);
    }

    println!();
    println!("  Minimization");
    println!("  ============");
    println!();
    println!("  Run:        {}", report.run_id);
    println!("  Key:        {}", report.key);
    println!("  Method:     {}", report.method);
    println!(
        "  Saved:      {} of {} ({:.1}%)",
        report.tokens_saved,
        report.original.len(),
        report.compression_ratio * 100.0
    );
    println!("  Elapsed:    {:?}", report.elapsed);
    println!();
    println!("{}", helpers::format_sequence(&report.optimized));
    println!();
    println!("{}", minimizer.status());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: demo
// ---------------------------------------------------------------------------

fn cmd_demo(config: &PipelineConfig) -> Result<()> {
    let minimizer = Minimizer::from_config(config).context("failed to build minimizer")?;

    println!();
    println!("  cmdseq demo");
    println!("  ===========");

    for (name, items) in helpers::demo_sequences() {
        let sequence = Sequence::from_strs(items)
            .with_context(|| format!("invalid demo sequence `{name}`"))?;

        println!();
        println!("  {name}");
        println!("{}", helpers::format_sequence(&sequence));

        for target in OptimizationTarget::ALL {
            let report = minimizer.minimize(&sequence, target);
            println!();
            println!(
                "  -> {target} [{}], saved {} ({:.0}%)",
                report.method,
                report.tokens_saved,
                report.compression_ratio * 100.0
            );
            println!("{}", helpers::format_sequence(&report.optimized));
        }

        let again = minimizer.minimize(&sequence, OptimizationTarget::Auto);
        println!();
        println!("  -> repeat lookup: {}", again.method);
    }

    println!();
    println!("{}", minimizer.status());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: config
// ---------------------------------------------------------------------------

fn cmd_config(config: &PipelineConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Defaults => {
            print!("{}", PipelineConfig::default().to_toml_string()?);
        }
        ConfigAction::Check => {
            config.validate()?;
            SequenceRewriter::new(PatternAnalyzer::new(&config.analyzer), &config.rewrite)?;
            println!("configuration OK");
        }
    }
    Ok(())
}
