//! Common error types shared across mapfs crates.
//!
//! The installer and the e2e harness each define their own error enum and
//! wrap [`CommonError`] with `#[from]` for the failures they have in common:
//! I/O, configuration, and child processes that could not be launched.

mod common;

pub use common::CommonError;

/// Result type alias using [`CommonError`].
pub type Result<T> = std::result::Result<T, CommonError>;
