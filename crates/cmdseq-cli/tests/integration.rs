//! Integration tests for the `cmdseq` binary.
//!
//! Each test runs the compiled binary as a subprocess and checks its stdout,
//! using temporary files for configuration and input.

use std::io::Write;
use std::process::{Command, Output};

fn cmdseq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cmdseq"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run cmdseq")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "cmdseq failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ═══════════════════════════════════════════════════════════════════════
//  rewrite
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn rewrite_speed_cancels_pairs() {
    let out = cmdseq(&[
        "rewrite",
        "--target",
        "speed",
        r#"["H(q[0])", "H(q[0])", "X(q[1])", "X(q[1])"]"#,
    ]);
    assert_eq!(stdout_json(&out), serde_json::json!([]));
}

#[test]
fn rewrite_rejects_unknown_target() {
    let out = cmdseq(&["rewrite", "--target", "fastest", r#"["H(q[0])"]"#]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unsupported optimization target"));
}

#[test]
fn rewrite_reads_file_and_uses_config_target() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cmdseq.toml");
    let input_path = dir.path().join("input.json");
    std::fs::write(&config_path, "[rewrite]\ntarget = \"memory\"\n").unwrap();
    std::fs::write(&input_path, r#"["hadamard_gate(q[0])", "Rx(pi/4, q[0])"]"#).unwrap();

    let out = cmdseq(&[
        "--config",
        config_path.to_str().unwrap(),
        "rewrite",
        "--file",
        input_path.to_str().unwrap(),
    ]);
    assert_eq!(
        stdout_json(&out),
        serde_json::json!(["H(q[0])", "Rx(pi/2, q[0])"])
    );
}

#[test]
fn rewrite_expand_undoes_compression() {
    let out = cmdseq(&["rewrite", "--expand", r#"["COMPRESSED[2:A|B]", "C"]"#]);
    assert_eq!(stdout_json(&out), serde_json::json!(["A", "B", "C"]));
}

// ═══════════════════════════════════════════════════════════════════════
//  analyze / minimize
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn analyze_json_reports_repeats() {
    let out = cmdseq(&["analyze", "--json", r#"["A", "B", "A", "B"]"#]);
    let report = stdout_json(&out);
    assert_eq!(report["repeated_subsequences"][0]["positions"], serde_json::json!([0, 2]));
}

#[test]
fn minimize_repeat_hits_cache() {
    let out = cmdseq(&[
        "minimize",
        "--json",
        "--repeat",
        "2",
        "--target",
        "speed",
        r#"["X(q[0])", "X(q[0])", "Z(q[1])"]"#,
    ]);
    let report = stdout_json(&out);
    assert_eq!(report["method"]["kind"], "cache_hit");
    assert_eq!(report["optimized"], serde_json::json!(["Z(q[1])"]));
    assert_eq!(report["tokens_saved"], 2);
}

#[test]
fn minimize_unknown_target_returns_input() {
    let out = cmdseq(&["minimize", "--json", "--target", "turbo", r#"["H(q[0])", "H(q[0])"]"#]);
    let report = stdout_json(&out);
    assert_eq!(report["method"]["kind"], "fallback");
    assert_eq!(report["optimized"], serde_json::json!(["H(q[0])", "H(q[0])"]));
}

#[test]
fn malformed_input_fails() {
    let out = cmdseq(&["analyze", r#"["H(q[0])", 3]"#]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("JSON array"));
}

// ═══════════════════════════════════════════════════════════════════════
//  config / demo
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn config_check_reports_invalid_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[rewrite]\ncorrection_interval = 0").unwrap();

    let out = cmdseq(&["--config", file.path().to_str().unwrap(), "config", "check"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("correction_interval"));
}

#[test]
fn config_defaults_round_trip_through_file() {
    let defaults = cmdseq(&["config", "defaults"]);
    assert!(defaults.status.success());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&defaults.stdout).unwrap();
    let out = cmdseq(&["--config", file.path().to_str().unwrap(), "config", "check"]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "configuration OK");
}

#[test]
fn demo_runs() {
    let out = cmdseq(&["demo"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("bell pair"));
    assert!(text.contains("repeat lookup: cache hit"));
}
