//! Commands and sequences.
//!
//! A [`Command`] is an opaque operation token such as `"H(q[0])"`.  The only
//! structure the pipeline ever looks at is the operation name (text before
//! the first `(`) and the argument text inside the parentheses.
//!
//! A [`Sequence`] is the unit of hashing, caching and rewriting.  Its
//! canonical serialization is the JSON array of its commands, in order.

use std::fmt;
use std::slice;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One operation in a sequence.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Command(String);

impl Command {
    /// Build a command, rejecting blank text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(KernelError::invalid_input("command must not be blank"));
        }
        Ok(Self(text))
    }

    /// Build a command from text produced inside the rewriter.  The caller
    /// guarantees the text is non-blank.
    pub(crate) fn synthesized(text: String) -> Self {
        debug_assert!(!text.trim().is_empty());
        Self(text)
    }

    /// The raw command text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Operation name: everything before the first `(`, trimmed.  A command
    /// without parentheses is its own operation name.
    pub fn op_name(&self) -> &str {
        match self.0.find('(') {
            Some(open) => self.0[..open].trim(),
            None => self.0.trim(),
        }
    }

    /// Argument text between the first `(` and the last `)`, trimmed.
    pub fn args(&self) -> Option<&str> {
        let open = self.0.find('(')?;
        let close = self.0.rfind(')')?;
        (close > open).then(|| self.0[open + 1..close].trim())
    }

    /// Consume the command and return its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Command {
    type Error = KernelError;

    fn try_from(text: String) -> Result<Self> {
        Self::new(text)
    }
}

impl TryFrom<&str> for Command {
    type Error = KernelError;

    fn try_from(text: &str) -> Result<Self> {
        Self::new(text)
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.0
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// An ordered list of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(Vec<Command>);

impl Sequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from raw strings, validating every command.
    pub fn from_strs<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Command::new(item).map_err(|_| {
                    KernelError::invalid_input(format!("command at index {index} is blank"))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Build a sequence from an arbitrary JSON value.
    ///
    /// Fails with [`KernelError::InvalidInput`] unless the value is an array
    /// of non-blank strings.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(KernelError::invalid_input(format!(
                "expected an array of commands, got {}",
                json_kind(value)
            )));
        };

        let mut commands = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Value::String(text) = item else {
                return Err(KernelError::invalid_input(format!(
                    "command at index {index} is {}, expected a string",
                    json_kind(item)
                )));
            };
            let command = Command::new(text.as_str()).map_err(|_| {
                KernelError::invalid_input(format!("command at index {index} is blank"))
            })?;
            commands.push(command);
        }
        Ok(Self(commands))
    }

    /// Parse a JSON document into a sequence.
    pub fn parse_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// The canonical, order-preserving serialization used as hash input.
    pub fn canonical_form(&self) -> String {
        Value::Array(
            self.0
                .iter()
                .map(|command| Value::String(command.0.clone()))
                .collect(),
        )
        .to_string()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence has no commands.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the commands as a slice.
    pub fn as_slice(&self) -> &[Command] {
        &self.0
    }

    /// Iterate over the commands in order.
    pub fn iter(&self) -> slice::Iter<'_, Command> {
        self.0.iter()
    }

    /// Append a command.
    pub fn push(&mut self, command: Command) {
        self.0.push(command);
    }

    /// Borrow the command texts.
    pub fn to_strs(&self) -> Vec<&str> {
        self.0.iter().map(Command::as_str).collect()
    }

    /// Consume the sequence and return its commands.
    pub fn into_commands(self) -> Vec<Command> {
        self.0
    }
}

impl From<Vec<Command>> for Sequence {
    fn from(commands: Vec<Command>) -> Self {
        Self(commands)
    }
}

impl FromIterator<Command> for Sequence {
    fn from_iter<T: IntoIterator<Item = Command>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Sequence {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Command;
    type IntoIter = slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strs().join(" "))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
