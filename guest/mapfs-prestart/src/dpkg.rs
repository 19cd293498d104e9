//! Package manager primitives.
//!
//! The installer only needs two things from dpkg: the installed version of a
//! package, and "install these `.deb` files". [`PackageManager`] abstracts
//! both so the retry logic can run against a scripted fake in tests.

use crate::error::{InstallerError, Result};
use crate::retry::AttemptResult;
use async_trait::async_trait;
use mapfs_constants::dpkg::{INSTALLED_STATUS, LOCKED_BY_ANOTHER_PROCESS};
use mapfs_error::CommonError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// `dpkg-query` format: status and version separated by a tab.
const QUERY_FORMAT: &str = "--showformat=${Status}\t${Version}";

/// Installed state of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageState {
    /// Package name.
    pub name: String,
    /// Installed version, if any.
    pub version: Option<String>,
    /// Whether dpkg reports the package fully installed.
    pub installed: bool,
}

impl PackageState {
    /// A package dpkg knows nothing about.
    #[must_use]
    pub fn not_installed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            installed: false,
        }
    }

    /// A fully installed package at `version`.
    #[must_use]
    pub fn installed(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
            installed: true,
        }
    }

    /// Returns true if the package is installed at exactly `version`.
    #[must_use]
    pub fn is_at(&self, version: &str) -> bool {
        self.installed && self.version.as_deref() == Some(version)
    }
}

/// Captured result of an install primitive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutput {
    /// Exit code (-1 if killed by a signal).
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl InstallOutput {
    /// Returns true if the command succeeded (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Non-empty output lines, stdout first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
    }

    /// First line reporting a lock held by another process.
    #[must_use]
    pub fn locked_line(&self) -> Option<&str> {
        self.lines().find(|line| line.contains(LOCKED_BY_ANOTHER_PROCESS))
    }
}

/// Package manager operations used by the installer.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Queries the installed state of `name`.
    async fn query(&self, name: &str) -> Result<PackageState>;

    /// Installs all of `debs` in one call.
    ///
    /// A dpkg run that starts and exits non-zero is an `Ok` output; only a
    /// failure to run dpkg at all is an error.
    async fn install(&self, debs: &[PathBuf]) -> Result<InstallOutput>;
}

/// Classifies an install primitive result.
#[must_use]
pub fn classify(output: &InstallOutput) -> AttemptResult {
    if output.success() {
        return AttemptResult::Installed;
    }

    if output.locked_line().is_some() {
        return AttemptResult::Locked;
    }

    let last_line = |text: &str| {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .last()
            .map(|line| line.trim().to_string())
    };
    let reason = last_line(&output.stderr)
        .or_else(|| last_line(&output.stdout))
        .unwrap_or_else(|| format!("dpkg exited with status {}", output.exit_code));
    AttemptResult::Failed(reason)
}

/// Parses `dpkg-query --showformat='${Status}\t${Version}'` output.
///
/// A non-zero exit means dpkg has no record of the package.
///
/// # Errors
///
/// Returns [`InstallerError::Query`] if a successful query printed something
/// other than `status<TAB>version`.
pub fn parse_query(name: &str, exit_code: i32, stdout: &str) -> Result<PackageState> {
    if exit_code != 0 {
        return Ok(PackageState::not_installed(name));
    }

    let line = stdout.lines().next().unwrap_or_default();
    let Some((status, version)) = line.split_once('\t') else {
        return Err(InstallerError::Query {
            package: name.to_string(),
            output: stdout.to_string(),
        });
    };

    let version = version.trim();
    Ok(PackageState {
        name: name.to_string(),
        version: (!version.is_empty()).then(|| version.to_string()),
        installed: status.trim() == INSTALLED_STATUS,
    })
}

/// [`PackageManager`] backed by the `dpkg` and `dpkg-query` binaries.
#[derive(Debug, Clone)]
pub struct DpkgCli {
    dpkg: PathBuf,
    dpkg_query: PathBuf,
}

impl DpkgCli {
    /// Creates a client using the given binaries.
    #[must_use]
    pub fn new(dpkg: impl Into<PathBuf>, dpkg_query: impl Into<PathBuf>) -> Self {
        Self {
            dpkg: dpkg.into(),
            dpkg_query: dpkg_query.into(),
        }
    }

    async fn run(program: &Path, args: &[&OsStr]) -> Result<InstallOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CommonError::spawn(program.display().to_string(), e))?;

        Ok(InstallOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Default for DpkgCli {
    fn default() -> Self {
        Self::new("dpkg", "dpkg-query")
    }
}

#[async_trait]
impl PackageManager for DpkgCli {
    async fn query(&self, name: &str) -> Result<PackageState> {
        let output = Self::run(
            &self.dpkg_query,
            &[OsStr::new("-W"), OsStr::new(QUERY_FORMAT), OsStr::new(name)],
        )
        .await?;
        tracing::debug!(
            package = name,
            exit_code = output.exit_code,
            stdout = %output.stdout.trim(),
            "dpkg-query"
        );
        parse_query(name, output.exit_code, &output.stdout)
    }

    async fn install(&self, debs: &[PathBuf]) -> Result<InstallOutput> {
        let mut args = vec![
            OsStr::new("--force-confdef"),
            OsStr::new("--force-confold"),
            OsStr::new("-i"),
        ];
        args.extend(debs.iter().map(|deb| deb.as_os_str()));

        tracing::info!(debs = ?debs, "running dpkg install");
        let output = Self::run(&self.dpkg, &args).await?;
        for line in output.lines() {
            tracing::debug!("dpkg: {line}");
        }
        Ok(output)
    }
}
