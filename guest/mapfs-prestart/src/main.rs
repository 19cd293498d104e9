//! mapfs pre-start hook.
//!
//! Installs the vendored fuse packages, waiting out dpkg lock contention up to
//! the configured deadline. Exit status: 0 installed or nothing to do, 1 timed
//! out waiting for the lock, 2 any other failure.

use anyhow::{Context, Result};
use clap::Parser;
use mapfs_constants::exit;
use mapfs_constants::paths::PRESTART_CONFIG;
use mapfs_prestart::retry::LOCK_LOG_TARGET;
use mapfs_prestart::{Config, DpkgCli, InstallReport, Installer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mapfs-prestart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file rendered by the job.
    #[arg(long, default_value = PRESTART_CONFIG)]
    config: PathBuf,

    /// Override the install deadline, in seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Override the delay between attempts while dpkg is locked, in milliseconds.
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::load_from(&cli.config);
    let level = match (&config, cli.debug) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };

    let mut filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mapfs_prestart={level}").into());
    // The locked-signal line is the hook's contract with its observers.
    if let Ok(directive) = format!("{LOCK_LOG_TARGET}=warn").parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = config
        .with_context(|| format!("failed to load {}", cli.config.display()))
        .and_then(|config| run(&cli, config));

    match result {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit::FAILED)
        }
    }
}

fn run(cli: &Cli, mut config: Config) -> Result<InstallReport> {
    if let Some(deadline_secs) = cli.deadline_secs {
        config.deadline_secs = deadline_secs;
    }
    if let Some(backoff_ms) = cli.backoff_ms {
        config.backoff_ms = backoff_ms;
    }
    config.validate().context("invalid configuration")?;

    tracing::info!(
        config = %cli.config.display(),
        deadline_secs = config.deadline_secs,
        backoff_ms = config.backoff_ms,
        "mapfs pre-start"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let dpkg = DpkgCli::new(config.dpkg.clone(), config.dpkg_query.clone());
    let installer = Installer::new(config, dpkg);
    runtime
        .block_on(installer.run())
        .context("fuse install aborted")
}
