//! Motif template instantiation.

use regex::{Captures, Regex};

use crate::config::Motif;
use crate::error::{KernelError, Result};
use crate::sequence::Command;

/// Placeholder syntax: `{N}`, `{N.op}`, `{N.args}`.
const PLACEHOLDER: &str = r"\{(\d+)(?:\.(op|args))?\}";

/// Compiled placeholder matcher shared by every template.
#[derive(Debug, Clone)]
pub(crate) struct TemplateEngine {
    placeholder: Regex,
}

impl TemplateEngine {
    pub(crate) fn new() -> Result<Self> {
        let placeholder = Regex::new(PLACEHOLDER)
            .map_err(|e| KernelError::invalid_config("analyzer.motifs", e.to_string()))?;
        Ok(Self { placeholder })
    }

    /// Reject templates that reference a command outside the motif.
    pub(crate) fn check(&self, motif: &Motif) -> Result<()> {
        let Some(template) = &motif.template else {
            return Ok(());
        };
        for part in template {
            for caps in self.placeholder.captures_iter(part) {
                let index: usize = caps[1].parse().unwrap_or(usize::MAX);
                if index >= motif.ops.len() {
                    return Err(KernelError::invalid_config(
                        "analyzer.motifs",
                        format!(
                            "motif `{}` template references command {} of {}",
                            motif.name,
                            &caps[1],
                            motif.ops.len()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Expand `template` against the commands matched by the motif.  Parts
    /// that expand to blank text are dropped.
    pub(crate) fn instantiate(&self, template: &[String], matched: &[Command]) -> Vec<Command> {
        template
            .iter()
            .filter_map(|part| {
                let text = self.placeholder.replace_all(part, |caps: &Captures<'_>| {
                    let Some(command) = caps[1].parse::<usize>().ok().and_then(|i| matched.get(i))
                    else {
                        return caps[0].to_string();
                    };
                    match caps.get(2).map(|m| m.as_str()) {
                        Some("op") => command.op_name().to_string(),
                        Some(_) => command.args().unwrap_or_default().to_string(),
                        None => command.as_str().to_string(),
                    }
                });
                (!text.trim().is_empty()).then(|| Command::synthesized(text.into_owned()))
            })
            .collect()
    }
}
