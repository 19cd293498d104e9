/// Prefix for installer configuration overrides (`MAPFS_PRESTART_DEADLINE_SECS`, ...).
pub const PRESTART_ENV_PREFIX: &str = "MAPFS_PRESTART_";

/// Location of the mapfs release source passed to the director on deploy.
pub const MAPFS_RELEASE_PATH: &str = "MAPFS_RELEASE_PATH";

/// Path to the `bosh` CLI used by the harness.
pub const BOSH_BIN: &str = "BOSH_BIN";

/// Deployment name override for the e2e harness.
pub const E2E_DEPLOYMENT: &str = "MAPFS_E2E_DEPLOYMENT";

/// Path to a prebuilt lock helper binary for the e2e harness.
pub const E2E_LOCK_HELPER: &str = "MAPFS_E2E_LOCK_HELPER";

/// Stemcell URL uploaded when the director has none.
pub const E2E_STEMCELL_URL: &str = "MAPFS_E2E_STEMCELL_URL";

/// Enables verbose harness logging.
pub const E2E_VERBOSE: &str = "E2E_VERBOSE";
