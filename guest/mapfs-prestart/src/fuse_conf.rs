//! fuse.conf maintenance.

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Option that lets non-root users pass `allow_other` to fuse mounts.
pub const USER_ALLOW_OTHER: &str = "user_allow_other";

/// Ensures `path` contains an active `user_allow_other` line.
///
/// Creates the file if it does not exist. Returns true if the file was
/// changed.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn ensure_user_allow_other(path: &Path) -> Result<bool> {
    let current = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if current.lines().any(|line| line.trim() == USER_ALLOW_OTHER) {
        tracing::debug!(path = %path.display(), "{USER_ALLOW_OTHER} already enabled");
        return Ok(false);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !current.is_empty() && !current.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{USER_ALLOW_OTHER}")?;

    tracing::info!(path = %path.display(), "enabled {USER_ALLOW_OTHER}");
    Ok(true)
}
