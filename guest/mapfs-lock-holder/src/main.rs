//! `lock_dpkg`: holds the dpkg status database lock until SIGTERM or SIGINT.
//!
//! Prints `locked <path>` on stdout once the lock is held. Used by the e2e
//! harness to simulate another package operation running on the VM.

use anyhow::{Context, Result};
use clap::Parser;
use mapfs_constants::dpkg::STATUS_LOCK_PATH;
use mapfs_lock_holder::DpkgLock;
use std::io::Write;
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "lock_dpkg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Lock file to hold.
    #[arg(long, default_value = STATUS_LOCK_PATH)]
    lock_path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lock_dpkg=info,mapfs_lock_holder=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Handlers go in before the lock is announced so a release request sent
    // right after the confirmation is not lost.
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    let path = cli.lock_path.clone();
    let lock = tokio::task::spawn_blocking(move || DpkgLock::acquire(path))
        .await
        .context("lock task failed")?
        .with_context(|| format!("failed to lock {}", cli.lock_path.display()))?;

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", lock.confirmation())?;
    stdout.flush()?;
    tracing::info!(path = %lock.path().display(), "holding lock");

    tokio::select! {
        _ = terminate.recv() => tracing::info!("received SIGTERM"),
        _ = interrupt.recv() => tracing::info!("received SIGINT"),
    }

    drop(lock);
    tracing::info!("released lock");
    Ok(())
}
