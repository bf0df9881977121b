//! fintrack-queue: inspect and flush the offline write queue.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fintrack_client::{init_logging, ApiClient, ClientConfig, QueueDrainer};

/// Inspect and flush the FinTrack offline write queue
#[derive(Parser)]
#[command(name = "fintrack-queue")]
#[command(about = "Inspect and flush the FinTrack offline write queue", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to FINTRACK_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending writes in replay order
    List,

    /// Replay pending writes once and report how many were delivered
    Drain,

    /// Drop one pending write without delivering it
    Remove {
        /// Record id as shown by `list`
        id: String,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::from_env(),
    };
    let client = ApiClient::new(config).context("building API client")?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute_command(Arc::new(client), cli.command))
}

async fn execute_command(client: Arc<ApiClient>, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            let records = client.queue().sorted().await?;
            if records.is_empty() {
                println!("No pending writes");
            }
            for record in records {
                println!("{}", record);
            }
        },
        Commands::Drain => {
            let pending = client.pending_writes().await?;
            let drained = QueueDrainer::new(Arc::clone(&client)).drain().await?;
            println!("Delivered {} of {} pending writes", drained, pending);
        },
        Commands::Remove { id } => {
            client.queue().remove(&id).await?;
            println!("Removed {}", id);
        },
    }
    Ok(())
}
