//! Individual rewrite passes.
//!
//! Each pass takes a slice of commands and returns a new vector; none of
//! them mutate their input.  Passes that need pattern information receive
//! the [`AnalysisReport`] computed before any rewriting took place.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;

use crate::analyzer::{AnalysisReport, MotifHit, PatternAnalyzer, RepeatedSubsequence};
use crate::error::{KernelError, Result};
use crate::sequence::Command;
use crate::signature::is_whole_word;

/// Prefix of a compression marker token.
pub const COMPRESSED_PREFIX: &str = "COMPRESSED[";

/// Operation name given to fused commands of different types.
pub const COMBINED_OP: &str = "COMBINED";

// ---------------------------------------------------------------------------
// Token substitution
// ---------------------------------------------------------------------------

/// Simultaneous, leftmost-longest token replacement.  Only whole-word
/// matches are replaced, so `pi/8` leaves `pi/80` alone.
#[derive(Debug, Clone)]
pub(crate) struct Substitution {
    automaton: AhoCorasick,
    replacements: Vec<String>,
}

impl Substitution {
    pub(crate) fn build<'a, I>(field: &'static str, pairs: I, case_insensitive: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let (patterns, replacements): (Vec<&str>, Vec<String>) = pairs
            .into_iter()
            .map(|(from, to)| (from, to.to_string()))
            .unzip();

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(case_insensitive)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|e| KernelError::invalid_config(field, e.to_string()))?;

        Ok(Self {
            automaton,
            replacements,
        })
    }

    pub(crate) fn apply(&self, command: &Command) -> Command {
        if self.replacements.is_empty() || !self.automaton.is_match(command.as_str()) {
            return command.clone();
        }
        let text = command.as_str();
        let mut replaced = String::with_capacity(text.len());
        let mut last = 0;
        for mat in self.automaton.find_iter(text) {
            if !is_whole_word(text, mat.start(), mat.end()) {
                continue;
            }
            replaced.push_str(&text[last..mat.start()]);
            replaced.push_str(&self.replacements[mat.pattern().as_usize()]);
            last = mat.end();
        }
        replaced.push_str(&text[last..]);
        if replaced.trim().is_empty() {
            return command.clone();
        }
        Command::synthesized(replaced)
    }
}

/// Apply `substitution` to every command accepted by `filter`.
pub(crate) fn substitute_where<F>(
    commands: &[Command],
    substitution: &Substitution,
    filter: F,
) -> Vec<Command>
where
    F: Fn(&Command) -> bool,
{
    commands
        .iter()
        .map(|command| {
            if filter(command) {
                substitution.apply(command)
            } else {
                command.clone()
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// Remove adjacent cancelling pairs.  Works like bracket matching, so a pair
/// that becomes adjacent after an inner pair is removed also cancels.
pub(crate) fn cancel_pairs(commands: &[Command], pairs: &[[String; 2]]) -> Vec<Command> {
    let mut out: Vec<Command> = Vec::with_capacity(commands.len());
    for command in commands {
        if out.last().is_some_and(|top| cancels(top, command, pairs)) {
            out.pop();
        } else {
            out.push(command.clone());
        }
    }
    out
}

fn cancels(a: &Command, b: &Command, pairs: &[[String; 2]]) -> bool {
    if a.args() != b.args() {
        return false;
    }
    let (x, y) = (a.op_name(), b.op_name());
    pairs
        .iter()
        .any(|[p, q]| (p == x && q == y) || (p == y && q == x))
}

/// Parses rotation angles such as `pi/4`, `-3*pi/2`, `2pi` or `0.5`.
#[derive(Debug, Clone)]
pub(crate) struct AngleParser {
    symbolic: Regex,
    placeholder: f64,
}

impl AngleParser {
    pub(crate) fn new(placeholder: f64) -> Result<Self> {
        let symbolic = Regex::new(
            r"(?i)^(?P<sign>[+-])?\s*(?:(?P<coef>\d+(?:\.\d+)?)\s*\*?\s*)?pi(?:\s*/\s*(?P<div>\d+(?:\.\d+)?))?$",
        )
        .map_err(|e| KernelError::invalid_config("rewrite.fusable_axes", e.to_string()))?;
        Ok(Self {
            symbolic,
            placeholder,
        })
    }

    /// Angle in radians, or the placeholder when the text is not a number.
    pub(crate) fn parse(&self, text: &str) -> f64 {
        let text = text.trim();
        if let Ok(value) = text.parse::<f64>() {
            if value.is_finite() {
                return value;
            }
        }
        let Some(caps) = self.symbolic.captures(text) else {
            return self.placeholder;
        };

        let coef = caps
            .name("coef")
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(1.0);
        let div = caps
            .name("div")
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(1.0);
        if div == 0.0 {
            return self.placeholder;
        }
        let sign = if caps.name("sign").is_some_and(|m| m.as_str() == "-") {
            -1.0
        } else {
            1.0
        };
        sign * coef * std::f64::consts::PI / div
    }
}

/// Split a rotation's arguments into the angle and the remaining operands.
fn split_rotation(command: &Command) -> (&str, &str) {
    let args = command.args().unwrap_or_default();
    match args.split_once(',') {
        Some((angle, operands)) => (angle.trim(), operands.trim()),
        None => (args, ""),
    }
}

/// Fuse runs of adjacent rotations about the same axis acting on the same
/// operands.  The fused angle is a plain sum of the parsed angles.
pub(crate) fn fuse_rotations(
    commands: &[Command],
    axes: &[String],
    angles: &AngleParser,
) -> Vec<Command> {
    let fusable = |c: &Command| axes.iter().any(|axis| axis == c.op_name());
    let same_group = |a: &Command, b: &Command| {
        a.op_name() == b.op_name() && split_rotation(a).1 == split_rotation(b).1
    };

    let mut out = Vec::with_capacity(commands.len());
    let mut i = 0;
    while i < commands.len() {
        let first = &commands[i];
        if !fusable(first) {
            out.push(first.clone());
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < commands.len() && same_group(first, &commands[end]) {
            end += 1;
        }
        if end - i == 1 {
            out.push(first.clone());
            i = end;
            continue;
        }

        let total: f64 = commands[i..end]
            .iter()
            .map(|c| angles.parse(split_rotation(c).0))
            .sum();
        let operands = split_rotation(first).1;
        let fused = if operands.is_empty() {
            format!("{}({total:.3})", first.op_name())
        } else {
            format!("{}({total:.3}, {operands})", first.op_name())
        };
        out.push(Command::synthesized(fused));
        i = end;
    }
    out
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// Insert `marker` after every `interval` input commands.
pub(crate) fn insert_corrections(
    commands: &[Command],
    interval: usize,
    marker: &Command,
) -> Vec<Command> {
    let interval = interval.max(1);
    let mut out = Vec::with_capacity(commands.len() + commands.len() / interval);
    for (index, command) in commands.iter().enumerate() {
        out.push(command.clone());
        if (index + 1) % interval == 0 {
            out.push(marker.clone());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Auto
// ---------------------------------------------------------------------------

/// Fold a group of similar commands into one.
///
/// Commands sharing an operation name become `op(args1 | args2 | ...)`;
/// mixed groups become `COMBINED(cmd1|cmd2|...)`.
pub(crate) fn fuse_group(group: &[Command]) -> Command {
    if let [single] = group {
        return single.clone();
    }
    let op = group.first().map(Command::op_name).unwrap_or_default();
    if group.iter().all(|c| c.op_name() == op) {
        let args: Vec<&str> = group.iter().map(|c| c.args().unwrap_or_default()).collect();
        Command::synthesized(format!("{op}({})", args.join(" | ")))
    } else {
        let parts: Vec<&str> = group.iter().map(Command::as_str).collect();
        Command::synthesized(format!("{COMBINED_OP}({})", parts.join("|")))
    }
}

/// Fuse every maximal run of similar commands inside `window`.
pub(crate) fn fuse_similar(window: &[Command], analyzer: &PatternAnalyzer) -> Vec<Command> {
    let mut out = Vec::new();
    let mut start = 0;
    for index in 1..=window.len() {
        if index < window.len() && analyzer.are_similar(&window[index - 1], &window[index]) {
            continue;
        }
        out.push(fuse_group(&window[start..index]));
        start = index;
    }
    out
}

/// Replace each motif occurrence with its template, left to right.
///
/// When several motifs start at the same position the highest score wins,
/// then the longer motif, then catalog order.  Occurrences overlapping an
/// already rewritten region are skipped.
pub(crate) fn instantiate_motifs<F>(
    commands: &[Command],
    report: &AnalysisReport,
    mut expand: F,
) -> Vec<Command>
where
    F: FnMut(&MotifHit, &[Command]) -> Vec<Command>,
{
    let mut best: HashMap<usize, &MotifHit> = HashMap::new();
    for hit in &report.motif_hits {
        let better = best.get(&hit.position).is_none_or(|current| {
            hit.score > current.score
                || (hit.score == current.score && hit.length > current.length)
        });
        if better {
            best.insert(hit.position, hit);
        }
    }

    let mut out = Vec::with_capacity(commands.len());
    let mut i = 0;
    while i < commands.len() {
        match best.get(&i) {
            Some(hit) if i + hit.length <= commands.len() => {
                out.extend(expand(hit, &commands[i..i + hit.length]));
                i += hit.length;
            }
            _ => {
                out.push(commands[i].clone());
                i += 1;
            }
        }
    }
    out
}

/// Build the marker token for a repeated pattern.
pub fn compression_marker(pattern: &[Command]) -> Command {
    let parts: Vec<&str> = pattern.iter().map(Command::as_str).collect();
    Command::synthesized(format!(
        "{COMPRESSED_PREFIX}{}:{}]",
        pattern.len(),
        parts.join("|")
    ))
}

/// Replace every occurrence of the longest repeated pattern starting at the
/// cursor with a single marker.
pub(crate) fn compress_repeats(
    commands: &[Command],
    report: &AnalysisReport,
    max_len: usize,
) -> Vec<Command> {
    let mut longest: HashMap<usize, &RepeatedSubsequence> = HashMap::new();
    for rep in report
        .repeated_subsequences
        .iter()
        .filter(|rep| rep.length <= max_len)
    {
        for &position in &rep.positions {
            let longer = longest
                .get(&position)
                .is_none_or(|current| rep.length > current.length);
            if longer {
                longest.insert(position, rep);
            }
        }
    }

    let mut out = Vec::with_capacity(commands.len());
    let mut i = 0;
    while i < commands.len() {
        match longest.get(&i) {
            Some(rep) if i + rep.length <= commands.len() => {
                out.push(compression_marker(&rep.pattern));
                i += rep.length;
            }
            _ => {
                out.push(commands[i].clone());
                i += 1;
            }
        }
    }
    out
}

/// Fuse each similarity run recorded in `report`.
pub(crate) fn fuse_runs(commands: &[Command], report: &AnalysisReport) -> Vec<Command> {
    let runs: HashMap<usize, usize> = report
        .similarity_runs
        .iter()
        .map(|run| (run.start, run.end()))
        .collect();

    let mut out = Vec::with_capacity(commands.len());
    let mut i = 0;
    while i < commands.len() {
        match runs.get(&i) {
            Some(&end) if end <= commands.len() && end > i => {
                out.push(fuse_group(&commands[i..end]));
                i = end;
            }
            _ => {
                out.push(commands[i].clone());
                i += 1;
            }
        }
    }
    out
}

/// Expand compression markers back into the commands they stand for.
/// Markers whose declared length does not match their payload are kept.
pub(crate) fn expand_markers(commands: &[Command]) -> Vec<Command> {
    let mut out = Vec::with_capacity(commands.len());
    for command in commands {
        match parse_marker(command.as_str()) {
            Some(parts) => out.extend(parts.into_iter().map(|p| Command::synthesized(p.to_string()))),
            None => out.push(command.clone()),
        }
    }
    out
}

fn parse_marker(text: &str) -> Option<Vec<&str>> {
    let body = text.strip_prefix(COMPRESSED_PREFIX)?.strip_suffix(']')?;
    let (count, payload) = body.split_once(':')?;
    let count: usize = count.parse().ok()?;
    let parts: Vec<&str> = payload.split('|').collect();
    (parts.len() == count && parts.iter().all(|p| !p.trim().is_empty())).then_some(parts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;

    fn commands(items: &[&str]) -> Vec<Command> {
        items.iter().map(|s| Command::new(*s).unwrap()).collect()
    }

    fn texts(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(Command::as_str).collect()
    }

    #[test]
    fn nested_pairs_cancel() {
        let pairs = RewriteConfig::default().cancellation_pairs;
        let out = cancel_pairs(&commands(&["X(q[0])", "H(q[0])", "H(q[0])", "X(q[0])"]), &pairs);
        assert!(out.is_empty());
    }

    #[test]
    fn pairs_on_different_operands_survive() {
        let pairs = RewriteConfig::default().cancellation_pairs;
        let input = commands(&["H(q[0])", "H(q[1])"]);
        assert_eq!(cancel_pairs(&input, &pairs), input);
    }

    #[test]
    fn dagger_pairs_cancel_in_both_orders() {
        let pairs = RewriteConfig::default().cancellation_pairs;
        let out = cancel_pairs(&commands(&["S†(q[0])", "S(q[0])", "T(q[1])", "T†(q[1])"]), &pairs);
        assert!(out.is_empty());
    }

    #[test]
    fn angles_parse() {
        let parser = AngleParser::new(0.25).unwrap();
        let pi = std::f64::consts::PI;
        assert!((parser.parse("pi/4") - pi / 4.0).abs() < 1e-12);
        assert!((parser.parse("-3*pi/2") + 3.0 * pi / 2.0).abs() < 1e-12);
        assert!((parser.parse("2pi") - 2.0 * pi).abs() < 1e-12);
        assert!((parser.parse("0.5") - 0.5).abs() < 1e-12);
        assert_eq!(parser.parse("theta"), 0.25);
        assert_eq!(parser.parse("pi/0"), 0.25);
    }

    #[test]
    fn rotations_fuse_per_axis_and_operand() {
        let config = RewriteConfig::default();
        let parser = AngleParser::new(config.placeholder_angle).unwrap();
        let out = fuse_rotations(
            &commands(&[
                "Rz(pi/4, q[0])",
                "Rz(pi/4, q[0])",
                "Rz(pi/4, q[1])",
                "Rx(0.5)",
                "Rx(0.25)",
            ]),
            &config.fusable_axes,
            &parser,
        );
        assert_eq!(texts(&out), vec!["Rz(1.571, q[0])", "Rz(pi/4, q[1])", "Rx(0.750)"]);
    }

    #[test]
    fn corrections_follow_every_interval() {
        let marker = Command::new("fix()").unwrap();
        let out = insert_corrections(&commands(&["a", "b", "c", "d", "e"]), 2, &marker);
        assert_eq!(texts(&out), vec!["a", "b", "fix()", "c", "d", "fix()", "e"]);
    }

    #[test]
    fn substitution_is_simultaneous() {
        let subst = Substitution::build(
            "test",
            [("pi/2", "pi/4"), ("pi/4", "pi/8")],
            false,
        )
        .unwrap();
        let out = subst.apply(&Command::new("Rx(pi/2 + pi/4)").unwrap());
        assert_eq!(out.as_str(), "Rx(pi/4 + pi/8)");
    }

    #[test]
    fn substitution_skips_partial_tokens() {
        let subst = Substitution::build("test", [("pi/8", "pi/16")], false).unwrap();
        let untouched = Command::new("Rz(pi/80, q[0])").unwrap();
        assert_eq!(subst.apply(&untouched), untouched);
        assert_eq!(
            subst.apply(&Command::new("Rz(3*pi/8, q[0])").unwrap()).as_str(),
            "Rz(3*pi/16, q[0])"
        );
    }

    #[test]
    fn fuse_group_shapes() {
        assert_eq!(
            fuse_group(&commands(&["H(q[0])", "H(q[1])"])).as_str(),
            "H(q[0] | q[1])"
        );
        assert_eq!(
            fuse_group(&commands(&["Rx(a)", "Ry(b)"])).as_str(),
            "COMBINED(Rx(a)|Ry(b))"
        );
    }

    #[test]
    fn markers_expand_back() {
        let pattern = commands(&["A(1)", "B(2)"]);
        let marker = compression_marker(&pattern);
        assert_eq!(marker.as_str(), "COMPRESSED[2:A(1)|B(2)]");
        let out = expand_markers(&[marker.clone(), Command::new("C").unwrap(), marker]);
        assert_eq!(texts(&out), vec!["A(1)", "B(2)", "C", "A(1)", "B(2)"]);
    }

    #[test]
    fn malformed_markers_are_kept() {
        let odd = commands(&["COMPRESSED[3:A|B]", "COMPRESSED[x:A]"]);
        assert_eq!(expand_markers(&odd), odd);
    }
}
