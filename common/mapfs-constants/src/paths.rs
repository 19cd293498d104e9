/// Job hook that installs the fuse packages.
pub const PRE_START: &str = "/var/vcap/jobs/mapfs/bin/pre-start";

/// Installer configuration rendered by the job.
pub const PRESTART_CONFIG: &str = "/var/vcap/jobs/mapfs/config/prestart.toml";

/// mapfs binary shipped by the release.
pub const MAPFS_BINARY: &str = "/var/vcap/packages/mapfs/bin/mapfs";

/// Directory holding the vendored fuse `.deb` files.
pub const FUSE_DEBS_DIR: &str = "/var/vcap/packages/mapfs-fuse";

/// fuse configuration file.
pub const FUSE_CONF: &str = "/etc/fuse.conf";

/// Where the harness copies the lock helper on the VM.
pub const LOCK_HELPER_REMOTE: &str = "/tmp/lock_dpkg";

/// Process name the harness signals to release the artificial lock.
pub const LOCK_HELPER_PROCESS: &str = "lock_dpkg";
