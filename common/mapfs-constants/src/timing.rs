/// Delay between install attempts while the dpkg lock is held.
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

/// Hard deadline for the whole install, measured from hook start (5 minutes).
///
/// dpkg's own lock holders (unattended upgrades, other jobs' pre-start) finish
/// well within this.
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Largest accepted install deadline (one day).
pub const MAX_DEADLINE_SECS: u64 = 86_400;
