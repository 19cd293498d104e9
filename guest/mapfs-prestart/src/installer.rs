//! Lock-aware fuse installer.

use crate::config::{Config, PackageSpec};
use crate::dpkg::{PackageManager, classify};
use crate::error::Result;
use crate::fuse_conf;
use crate::retry::{Action, AttemptResult, Input, LOCK_LOG_TARGET, RetryMachine, Verdict};
use mapfs_constants::dpkg::LOCKED_SIGNAL;
use mapfs_constants::exit;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// How an installer attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Packages installed (or upgraded) to the target version.
    Installed,
    /// Every package was already at its target version; dpkg was not run.
    AlreadySatisfied,
    /// mapfs is disabled; nothing was touched.
    Disabled,
    /// The dpkg lock stayed held until the deadline.
    TimedOut,
    /// dpkg failed for a reason other than the lock.
    Failed(String),
}

impl Outcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Installed | Self::AlreadySatisfied | Self::Disabled => exit::INSTALLED,
            Self::TimedOut => exit::TIMED_OUT,
            Self::Failed(_) => exit::FAILED,
        }
    }

    /// Returns true if the packages are in the desired state.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code() == exit::INSTALLED
    }
}

/// Summary of one installer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Terminal outcome.
    pub outcome: Outcome,
    /// Install primitive calls made.
    pub attempts: u32,
    /// Calls that hit the dpkg lock.
    pub locked_events: u32,
    /// Time from invocation to the outcome.
    pub elapsed: Duration,
}

impl InstallReport {
    fn immediate(outcome: Outcome, started: Instant) -> Self {
        Self {
            outcome,
            attempts: 0,
            locked_events: 0,
            elapsed: started.elapsed(),
        }
    }

    /// Process exit status for this report.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

/// Installs the configured packages, retrying while dpkg is locked.
pub struct Installer<P> {
    config: Config,
    packages: P,
}

impl<P: PackageManager> Installer<P> {
    /// Creates an installer over the given package manager.
    pub fn new(config: Config, packages: P) -> Self {
        Self { config, packages }
    }

    /// Returns the installer configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one installer attempt.
    ///
    /// # Errors
    ///
    /// Returns an error only when the attempt cannot reach an outcome: a
    /// package query that cannot run, or fuse.conf that cannot be written.
    /// Lock timeouts and dpkg failures are reported as [`Outcome`]s.
    pub async fn run(&self) -> Result<InstallReport> {
        let started = Instant::now();

        if !self.config.enabled {
            tracing::info!("mapfs is disabled; skipping fuse install");
            return Ok(InstallReport::immediate(Outcome::Disabled, started));
        }

        let pending = self.pending_packages().await?;
        if pending.is_empty() {
            tracing::info!("fuse packages already at target version");
            self.configure_fuse()?;
            return Ok(InstallReport::immediate(
                Outcome::AlreadySatisfied,
                started,
            ));
        }

        let debs: Vec<PathBuf> = pending.iter().map(|spec| spec.deb.clone()).collect();
        let mut machine = RetryMachine::new(self.config.retry_policy(), started);

        let mut action = machine.step(Input::Invoke, Instant::now())?;
        let verdict = loop {
            action = match action {
                Action::Install => {
                    let result = self.attempt(&debs).await;
                    machine.step(Input::Attempted(result), Instant::now())?
                }
                Action::Wait(delay) => {
                    tokio::time::sleep(delay).await;
                    machine.step(Input::BackoffElapsed, Instant::now())?
                }
                Action::Finish(verdict) => break verdict,
            };
        };

        let outcome = match verdict {
            Verdict::Installed => match self.verify(&pending).await? {
                Some(mismatch) => Outcome::Failed(mismatch),
                None => {
                    self.configure_fuse()?;
                    Outcome::Installed
                }
            },
            Verdict::TimedOut => Outcome::TimedOut,
            Verdict::Failed(reason) => Outcome::Failed(reason),
        };

        let report = InstallReport {
            outcome,
            attempts: machine.attempts(),
            locked_events: machine.locked_events(),
            elapsed: started.elapsed(),
        };
        self.log_report(&report);
        Ok(report)
    }

    /// Packages not yet at their target version, in configured order.
    async fn pending_packages(&self) -> Result<Vec<PackageSpec>> {
        let mut pending = Vec::new();
        for spec in &self.config.packages {
            let state = self.packages.query(&spec.name).await?;
            if state.is_at(&spec.version) {
                tracing::debug!(package = %spec.name, version = %spec.version, "already installed");
            } else {
                tracing::info!(
                    package = %spec.name,
                    installed = state.version.as_deref().unwrap_or("none"),
                    target = %spec.version,
                    "package needs install"
                );
                pending.push(spec.clone());
            }
        }
        Ok(pending)
    }

    /// One install primitive call, classified.
    async fn attempt(&self, debs: &[PathBuf]) -> AttemptResult {
        match self.packages.install(debs).await {
            Ok(output) => {
                let result = classify(&output);
                // Other dpkg locks are retried like the status database.
                let other_lock = output
                    .locked_line()
                    .filter(|line| !line.contains(LOCKED_SIGNAL));
                if let (AttemptResult::Locked, Some(line)) = (&result, other_lock) {
                    tracing::warn!(target: LOCK_LOG_TARGET, dpkg = line, "dpkg lock held");
                }
                result
            }
            Err(e) => AttemptResult::Failed(e.to_string()),
        }
    }

    /// Re-queries installed packages; returns a description of the first one
    /// not at its target version.
    async fn verify(&self, installed: &[PackageSpec]) -> Result<Option<String>> {
        for spec in installed {
            let state = self.packages.query(&spec.name).await?;
            if !state.is_at(&spec.version) {
                return Ok(Some(format!(
                    "{} is at {} after install, expected {}",
                    spec.name,
                    state.version.as_deref().unwrap_or("nothing"),
                    spec.version
                )));
            }
        }
        Ok(None)
    }

    fn configure_fuse(&self) -> Result<()> {
        if self.config.fuse_conf.user_allow_other {
            fuse_conf::ensure_user_allow_other(&self.config.fuse_conf.path)?;
        }
        Ok(())
    }

    fn log_report(&self, report: &InstallReport) {
        let elapsed_ms = report.elapsed.as_millis() as u64;
        match &report.outcome {
            Outcome::Installed => tracing::info!(
                attempts = report.attempts,
                locked_events = report.locked_events,
                elapsed_ms,
                "installed fuse packages"
            ),
            Outcome::TimedOut => tracing::error!(
                attempts = report.attempts,
                locked_events = report.locked_events,
                elapsed_ms,
                "timed out after {:?} waiting for the dpkg lock",
                self.config.retry_policy().deadline
            ),
            Outcome::Failed(reason) => tracing::error!(
                attempts = report.attempts,
                elapsed_ms,
                "dpkg install failed: {reason}"
            ),
            Outcome::AlreadySatisfied | Outcome::Disabled => {}
        }
    }
}
