/// Packages installed, already at the target version, or mapfs disabled.
pub const INSTALLED: u8 = 0;

/// The dpkg lock stayed held past the deadline.
pub const TIMED_OUT: u8 = 1;

/// Any other install or startup failure.
pub const FAILED: u8 = 2;
