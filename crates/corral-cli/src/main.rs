use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use corral_core::{CorralConfig, Result};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "Corral - shared-filesystem task coordination for worker agents", long_about = None)]
struct Cli {
    /// Data directory holding boards, locks, and mailboxes
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect board contents
    Board {
        #[command(subcommand)]
        action: commands::board::BoardAction,
    },
    /// Create, claim, and finish tasks
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Manage lease locks
    Lock {
        #[command(subcommand)]
        action: commands::lock::LockAction,
    },
    /// Run stale-task reclamation
    Reclaim {
        /// Keep sweeping on the configured interval instead of once
        #[arg(long)]
        follow: bool,
    },
    /// Record a worker heartbeat
    Heartbeat { worker_id: String },
    /// Exchange point-to-point messages
    Mail {
        #[command(subcommand)]
        action: commands::mail::MailAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {}", err.category(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CorralConfig::load(path)?,
        None => CorralConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let ctx = Context::new(config)?;
    match cli.command {
        Commands::Board { action } => commands::board::run(&ctx, action).await,
        Commands::Task { action } => commands::task::run(&ctx, action).await,
        Commands::Lock { action } => commands::lock::run(&ctx, action).await,
        Commands::Reclaim { follow } => commands::reclaim::run(&ctx, follow).await,
        Commands::Heartbeat { worker_id } => commands::heartbeat(&ctx, &worker_id).await,
        Commands::Mail { action } => commands::mail::run(&ctx, action).await,
    }
}
