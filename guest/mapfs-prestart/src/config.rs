//! Installer configuration.
//!
//! Configuration is loaded from multiple sources with the following priority:
//!
//! 1. Command-line overrides (`--deadline-secs`, `--backoff-ms`)
//! 2. Environment variables (`MAPFS_PRESTART_*`, nested keys joined by `__`)
//! 3. Configuration file rendered by the job
//!    (`/var/vcap/jobs/mapfs/config/prestart.toml`)
//! 4. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! enabled = true
//! backoff_ms = 1000
//! deadline_secs = 300
//!
//! [[packages]]
//! name = "libfuse2"
//! version = "2.9.7-1+deb9u2"
//! deb = "/var/vcap/packages/mapfs-fuse/libfuse2_2.9.7-1+deb9u2_amd64.deb"
//!
//! [[packages]]
//! name = "fuse"
//! version = "2.9.7-1+deb9u2"
//! deb = "/var/vcap/packages/mapfs-fuse/fuse_2.9.7-1+deb9u2_amd64.deb"
//!
//! [fuse_conf]
//! path = "/etc/fuse.conf"
//! user_allow_other = true
//!
//! [logging]
//! level = "info"
//! ```

use crate::retry::RetryPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use mapfs_constants::env::PRESTART_ENV_PREFIX;
use mapfs_constants::paths::{FUSE_CONF, FUSE_DEBS_DIR};
use mapfs_constants::timing::{DEFAULT_BACKOFF_MS, DEFAULT_DEADLINE_SECS, MAX_DEADLINE_SECS};
use mapfs_error::CommonError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// fuse version vendored by the release.
pub const FUSE_TARGET_VERSION: &str = "2.9.7-1+deb9u2";

/// Installer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false the hook installs nothing and exits 0.
    pub enabled: bool,
    /// Delay between install attempts while the dpkg lock is held.
    pub backoff_ms: u64,
    /// Hard deadline for the whole install, from hook start.
    pub deadline_secs: u64,
    /// dpkg binary.
    pub dpkg: PathBuf,
    /// dpkg-query binary.
    pub dpkg_query: PathBuf,
    /// Packages to install, dependencies first.
    pub packages: Vec<PackageSpec>,
    /// fuse configuration.
    pub fuse_conf: FuseConfConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_ms: DEFAULT_BACKOFF_MS,
            deadline_secs: DEFAULT_DEADLINE_SECS,
            dpkg: PathBuf::from("dpkg"),
            dpkg_query: PathBuf::from("dpkg-query"),
            packages: vec![
                PackageSpec::vendored("libfuse2", FUSE_TARGET_VERSION),
                PackageSpec::vendored("fuse", FUSE_TARGET_VERSION),
            ],
            fuse_conf: FuseConfConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment value cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(PRESTART_ENV_PREFIX).split("__"))
            .extract()
    }

    /// Checks values that would make the retry loop meaningless.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<(), CommonError> {
        if !self.enabled {
            return Ok(());
        }
        if self.backoff_ms == 0 {
            return Err(CommonError::config("backoff_ms must be greater than zero"));
        }
        if self.deadline_secs > MAX_DEADLINE_SECS {
            return Err(CommonError::config(format!(
                "deadline_secs must be at most {MAX_DEADLINE_SECS}, got {}",
                self.deadline_secs
            )));
        }
        if self.packages.is_empty() {
            return Err(CommonError::config(
                "at least one package is required while mapfs is enabled",
            ));
        }
        if let Some(spec) = self.packages.iter().find(|p| p.name.trim().is_empty()) {
            return Err(CommonError::config(format!(
                "package with deb {} has no name",
                spec.deb.display()
            )));
        }
        Ok(())
    }

    /// Retry policy derived from the timing settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_millis(self.backoff_ms),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}

/// One package the hook installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// dpkg package name.
    pub name: String,
    /// Exact version the package must end up at.
    pub version: String,
    /// `.deb` file providing that version.
    pub deb: PathBuf,
}

impl PackageSpec {
    /// A package vendored in the release's fuse package directory.
    #[must_use]
    pub fn vendored(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            deb: Path::new(FUSE_DEBS_DIR).join(format!("{name}_{version}_amd64.deb")),
        }
    }
}

/// fuse configuration file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfConfig {
    /// Path to fuse.conf.
    pub path: PathBuf,
    /// Ensure `user_allow_other` is enabled so mapfs mounts are visible to
    /// the application user.
    pub user_allow_other: bool,
}

impl Default for FuseConfConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(FUSE_CONF),
            user_allow_other: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
