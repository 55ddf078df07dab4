//! Common error types for halfplay

use thiserror::Error;

/// Common result type for halfplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the monitor and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Query, ping or subscription failure reported by the media server
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A duration or elapsed field that is missing or not a usable number
    #[error("Parse error: {field} = {value:?}")]
    Parse {
        /// Name of the offending status field
        field: &'static str,
        /// Raw value as reported (or "missing")
        value: String,
    },

    /// Initial connection, subscription or first status query failed
    #[error("Startup error: {0}")]
    Startup(String),

    /// Unrecoverable runtime failure (e.g. liveness retries exhausted)
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration file
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an upstream error from anything displayable
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Error::Upstream(err.to_string())
    }
}
