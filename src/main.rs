mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use orgcal_core::cancel::CancelFlag;
use orgcal_core::config::OrgcalConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "orgcal")]
#[command(about = "Sync scheduled org-mode headings to CalDAV calendars", version)]
struct Cli {
    /// Config file (default: ~/.config/orgcal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push scheduled headings to the configured calendars
    Sync {
        /// Only operate on this calendar (by id or name)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Look up remote state and report, without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Sync calendars concurrently
        #[arg(long)]
        parallel: bool,
    },
    /// Check that every configured calendar is reachable
    Check {
        /// Only operate on this calendar (by id or name)
        #[arg(short, long)]
        calendar: Option<String>,
    },
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,orgcal={level},orgcal_core={level},orgcal_caldav={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = OrgcalConfig::load(cli.config.as_deref())?;

    let cancel = CancelFlag::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current operation");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Sync {
            calendar,
            dry_run,
            parallel,
        } => {
            let calendars = commands::resolve_calendars(&config, calendar.as_deref())?;
            let args = commands::sync::SyncArgs { dry_run, parallel };
            commands::sync::run(&config, calendars, args, cancel).await
        }
        Commands::Check { calendar } => {
            let calendars = commands::resolve_calendars(&config, calendar.as_deref())?;
            commands::check::run(&config, calendars).await
        }
    }
}
