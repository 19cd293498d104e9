//! Common error types shared across mapfs crates.

use thiserror::Error;

/// Errors that occur across multiple mapfs crates.
#[derive(Debug, Error)]
pub enum CommonError {
    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Invalid or missing configuration values, or a configuration file that
    /// failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A child process could not be started at all.
    ///
    /// Distinct from a process that ran and exited non-zero: this means the
    /// program is missing, not executable, or the spawn syscall failed.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that failed to launch.
        program: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Invalid state transition.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CommonError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new launch failure for `program`.
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a new invalid state error.
    #[must_use]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if a child process failed to launch.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}
