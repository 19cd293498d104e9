//! Error types for the installer.

use crate::retry::RetryError;
use mapfs_error::CommonError;
use thiserror::Error;

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, InstallerError>;

/// Errors that stop the installer before it reaches an [`Outcome`](crate::Outcome).
///
/// Lock contention, timeouts and dpkg install failures are not errors here:
/// they are outcomes with their own exit status.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Shared error (I/O, configuration, launch failure).
    #[error(transparent)]
    Common(#[from] CommonError),

    /// The retry machine was driven out of order.
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// dpkg-query printed something we could not interpret.
    #[error("unexpected dpkg-query output for {package}: {output:?}")]
    Query {
        /// Package that was queried.
        package: String,
        /// Raw output.
        output: String,
    },
}

impl From<std::io::Error> for InstallerError {
    fn from(err: std::io::Error) -> Self {
        Self::Common(CommonError::Io(err))
    }
}
