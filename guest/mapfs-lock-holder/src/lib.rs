//! # mapfs-lock-holder
//!
//! Holds the dpkg status database lock the same way dpkg does: a POSIX
//! `fcntl` write lock over the whole lock file. While a [`DpkgLock`] is alive
//! every other process's dpkg fails with "dpkg status database is locked by
//! another process".
//!
//! `fcntl` locks belong to the process, so a second lock taken from the same
//! process always succeeds. Contention is only observable across processes.

use mapfs_constants::dpkg::HELPER_LOCKED_PREFIX;
use mapfs_error::{CommonError, Result};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, fcntl};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Mode dpkg creates its lock files with.
const LOCK_FILE_MODE: u32 = 0o640;

/// A held write lock on a dpkg lock file.
///
/// Dropping the guard closes the file, which releases the lock.
#[derive(Debug)]
pub struct DpkgLock {
    /// Holds the lock until dropped.
    _file: File,
    path: PathBuf,
}

impl DpkgLock {
    /// Takes the lock, blocking until any other holder releases it.
    ///
    /// Creates the lock file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or locked.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open(path)?;
        set_write_lock(&file, true).map_err(|e| CommonError::Io(e.into()))?;
        tracing::debug!(path = %path.display(), "acquired lock");
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Takes the lock if nobody else holds it.
    ///
    /// Returns `None` if another process holds a conflicting lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the lock call fails
    /// for a reason other than contention.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open(path)?;
        match set_write_lock(&file, false) {
            Ok(()) => Ok(Some(Self {
                _file: file,
                path: path.to_path_buf(),
            })),
            Err(Errno::EAGAIN | Errno::EACCES) => Ok(None),
            Err(e) => Err(CommonError::Io(e.into())),
        }
    }

    /// Path of the locked file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line printed once the lock is held, e.g. `locked /var/lib/dpkg/lock`.
    #[must_use]
    pub fn confirmation(&self) -> String {
        format!("{HELPER_LOCKED_PREFIX} {}", self.path.display())
    }
}

fn open(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(LOCK_FILE_MODE)
        .open(path)
        .map_err(|e| {
            CommonError::Io(io::Error::new(
                e.kind(),
                format!("failed to open {}: {e}", path.display()),
            ))
        })
}

/// Sets a write lock over the whole file, retrying on `EINTR`.
fn set_write_lock(file: &File, wait: bool) -> nix::Result<()> {
    // SAFETY: flock is plain old data; all-zero is a valid value.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = libc::F_WRLCK as libc::c_short;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    // l_start = 0, l_len = 0: the whole file.

    loop {
        let arg = if wait {
            FcntlArg::F_SETLKW(&lock)
        } else {
            FcntlArg::F_SETLK(&lock)
        };
        match fcntl(file.as_raw_fd(), arg) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => {}
            Err(e) => return Err(e),
        }
    }
}
