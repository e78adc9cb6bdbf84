//! Optimization targets accepted by the rewriter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// What a rewrite should optimize for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationTarget {
    /// Cancel inverse pairs and fuse same-axis rotations.
    Speed,
    /// Insert correction markers and refine precision tokens.
    Accuracy,
    /// Coarsen precision tokens and shorten long operation names.
    Memory,
    /// Let the pattern analyzer pick a strategy.
    #[default]
    Auto,
}

impl OptimizationTarget {
    /// Every supported target, in declaration order.
    pub const ALL: [Self; 4] = [Self::Speed, Self::Accuracy, Self::Memory, Self::Auto];

    /// Lowercase name as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Accuracy => "accuracy",
            Self::Memory => "memory",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for OptimizationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationTarget {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|target| target.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KernelError::UnsupportedTarget {
                target: s.to_string(),
            })
    }
}
