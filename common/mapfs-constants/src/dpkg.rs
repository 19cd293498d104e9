/// Phrase dpkg prints when the status database lock is held elsewhere.
///
/// The e2e harness greps the pre-start output for exactly this substring, so
/// it must never change.
pub const LOCKED_SIGNAL: &str = "dpkg status database is locked by another process";

/// Full error line emitted by the installer on every contention event.
pub const LOCKED_ERROR_LINE: &str = "dpkg: error: dpkg status database is locked by another process";

/// Substring shared by every dpkg lock-contention message (status database
/// and frontend lock alike).
pub const LOCKED_BY_ANOTHER_PROCESS: &str = "locked by another process";

/// dpkg status database lock file.
pub const STATUS_LOCK_PATH: &str = "/var/lib/dpkg/lock";

/// Word the lock helper prints, followed by the lock path, once it holds the lock.
pub const HELPER_LOCKED_PREFIX: &str = "locked";

/// Confirmation line printed by the lock helper for the default lock path.
pub const HELPER_CONFIRMATION: &str = "locked /var/lib/dpkg/lock";

/// dpkg-query status of a fully installed package.
pub const INSTALLED_STATUS: &str = "install ok installed";
