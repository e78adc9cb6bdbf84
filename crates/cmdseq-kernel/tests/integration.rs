//! Integration tests for the cmdseq-kernel crate.
//!
//! These tests drive the analyzer and rewriter together through the public
//! API, using configurations loaded from TOML where relevant.

use cmdseq_kernel::{
    AnalyzerConfig, KernelError, OptimizationTarget, PatternAnalyzer, PipelineConfig,
    RewriteConfig, Sequence, SequenceRewriter, Strategy,
};

fn seq(items: &[&str]) -> Sequence {
    Sequence::from_strs(items.iter().copied()).unwrap()
}

fn rewriter_from(config: &PipelineConfig) -> SequenceRewriter {
    let analyzer = PatternAnalyzer::new(&config.analyzer);
    SequenceRewriter::new(analyzer, &config.rewrite).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
//  Analyzer
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn analyzer_reports_repeated_pair() {
    let analyzer = PatternAnalyzer::new(&AnalyzerConfig::default());
    let report = analyzer.analyze(&seq(&["A(1)", "B(2)", "A(1)", "B(2)"]));

    let hit = report
        .repeated_subsequences
        .iter()
        .find(|r| r.length == 2)
        .expect("length-2 repeat");
    assert_eq!(hit.pattern.iter().map(|c| c.as_str()).collect::<Vec<_>>(), vec!["A(1)", "B(2)"]);
    assert_eq!(hit.positions, vec![0, 2]);
}

#[test]
fn analyzer_report_serializes_to_json() {
    let analyzer = PatternAnalyzer::new(&AnalyzerConfig::default());
    let report = analyzer.analyze(&seq(&["H(q[0])", "CNOT(q[0], q[1])", "H(q[0])"]));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["motif_hits"][0]["name"], "bell_pair");
    assert_eq!(json["motif_hits"][0]["kind"], "initialization");
}

// ═══════════════════════════════════════════════════════════════════════
//  Rewriter
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn speed_end_to_end_example() {
    let rewriter = rewriter_from(&PipelineConfig::default());
    let out = rewriter.rewrite(
        &seq(&["H(q[0])", "H(q[0])", "X(q[1])", "X(q[1])"]),
        OptimizationTarget::Speed,
    );
    assert_eq!(out, Sequence::new());
}

#[test]
fn speed_fuses_rotations_after_cancellation() {
    let rewriter = rewriter_from(&PipelineConfig::default());
    let out = rewriter.rewrite(
        &seq(&["Rz(pi/4, q[0])", "X(q[1])", "X(q[1])", "Rz(pi/4, q[0])"]),
        OptimizationTarget::Speed,
    );
    assert_eq!(out.to_strs(), vec!["Rz(1.571, q[0])"]);
}

#[test]
fn auto_is_stable_without_patterns() {
    let rewriter = rewriter_from(&PipelineConfig::default());
    let input = seq(&["prepare(q[0])", "CNOT(q[0], q[1])", "Rx(pi/2, q[1])", "measure(q[1])"]);
    assert_eq!(rewriter.rewrite(&input, OptimizationTarget::Auto), input);
}

#[test]
fn rewriting_never_mutates_input() {
    let rewriter = rewriter_from(&PipelineConfig::default());
    let input = seq(&["A", "B", "A", "B", "H(q[0])", "H(q[0])"]);
    let snapshot = input.clone();
    for target in OptimizationTarget::ALL {
        let _ = rewriter.rewrite(&input, target);
    }
    assert_eq!(input, snapshot);
}

#[test]
fn custom_config_changes_correction_interval() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [rewrite]
        correction_interval = 2
        correction_marker = "sync()"
        "#,
    )
    .unwrap();
    let rewriter = rewriter_from(&config);

    let out = rewriter.rewrite(&seq(&["a", "b", "c"]), OptimizationTarget::Accuracy);
    assert_eq!(out.to_strs(), vec!["a", "b", "sync()", "c"]);
}

#[test]
fn custom_motif_template_from_toml() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [[analyzer.motifs]]
        name = "bell"
        kind = "initialization"
        ops = ["H", "CNOT"]
        score = 0.9
        template = ["BELL({1.args})"]
        "#,
    )
    .unwrap();
    let rewriter = rewriter_from(&config);

    let report = rewriter.rewrite_with_report(
        &seq(&["H(q[0])", "CNOT(q[0], q[1])", "measure(q[1])"]),
        OptimizationTarget::Auto,
    );
    assert_eq!(report.strategy, Strategy::MotifTemplates);
    assert_eq!(report.sequence.to_strs(), vec!["BELL(q[0], q[1])", "measure(q[1])"]);
}

#[test]
fn malformed_json_input_is_rejected() {
    let err = Sequence::parse_json(r#"["H(q[0])", null]"#).unwrap_err();
    assert!(matches!(err, KernelError::InvalidInput { .. }));

    let err = Sequence::parse_json(r#""H(q[0])""#).unwrap_err();
    assert!(matches!(err, KernelError::InvalidInput { .. }));
}

#[test]
fn unsupported_target_is_an_error() {
    let rewriter = SequenceRewriter::new(
        PatternAnalyzer::new(&AnalyzerConfig::default()),
        &RewriteConfig::default(),
    )
    .unwrap();
    let err = rewriter.rewrite_named(&seq(&["H(q[0])"]), "fastest").unwrap_err();
    assert_eq!(err.to_string(), "unsupported optimization target `fastest`");
}

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cmdseq.toml");
    std::fs::write(&path, "[analyzer]\nmin_repeat_len = 3\n").unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.analyzer.min_repeat_len, 3);

    let err = PipelineConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, KernelError::ConfigRead { .. }));
}
