//! Kernel error types.
//!
//! Every fallible operation in this crate surfaces a [`KernelError`].  The
//! variants are local, recoverable conditions: callers are expected to fall
//! back to the unmodified input sequence when they see one.

/// Unified error type for the cmdseq kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Input errors -------------------------------------------------------
    /// A sequence or command could not be built from the supplied value
    /// (not an array, non-string element, blank command).
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The optimization target is not one of `speed`, `accuracy`, `memory`
    /// or `auto`.
    #[error("unsupported optimization target `{target}`")]
    UnsupportedTarget { target: String },

    // -- Configuration errors -----------------------------------------------
    /// A configuration field holds a value the pipeline cannot work with.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// A configuration file could not be read.
    #[error("failed to read config `{path}`: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    // -- Serialization ------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML document could not be parsed.
    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value could not be rendered as TOML.
    #[error("toml render error: {0}")]
    TomlRender(#[from] toml::ser::Error),
}

impl KernelError {
    /// Shorthand for [`KernelError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`KernelError::InvalidConfig`].
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
