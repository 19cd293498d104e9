//! # mapfs-prestart
//!
//! Installs the fuse packages mapfs depends on during the job's pre-start
//! hook, on a VM where something else may be holding the dpkg lock.
//!
//! ## Flow
//!
//! ```text
//!   invoke ──► query packages ──► all at target? ──yes──► exit 0
//!                                      │ no
//!                                      ▼
//!                ┌──────────── RetryMachine ─────────────┐
//!                │ Attempting ──locked──► Locked ──wait──┤
//!                │     │                                 │
//!                │     ├─ ok ─────► Installed ──► exit 0 │
//!                │     ├─ error ──► Failed ─────► exit 2 │
//!                │     └─ locked past deadline ► exit 1  │
//!                └───────────────────────────────────────┘
//! ```
//!
//! Every contention event logs
//! [`LOCKED_ERROR_LINE`](mapfs_constants::dpkg::LOCKED_ERROR_LINE), which the
//! e2e harness matches on.

pub mod config;
pub mod dpkg;
pub mod error;
pub mod fuse_conf;
pub mod installer;
pub mod retry;

pub use config::Config;
pub use dpkg::{DpkgCli, InstallOutput, PackageManager, PackageState};
pub use error::{InstallerError, Result};
pub use installer::{InstallReport, Installer, Outcome};
pub use retry::{Action, AttemptResult, Input, RetryMachine, RetryPolicy, RetryState, Verdict};
