//! stepsync CLI
//!
//! Drives a backfill from the command line against the deterministic
//! synthetic source, and hosts the reference remote sink.
//!
//! # Commands
//!
//! - `serve` - Run the remote sink server
//! - `discover` - Partition a history window into chunks
//! - `sync` - Upload unsynced chunks (Ctrl-C pauses)
//! - `status` - Show progress recorded in the ledger
//! - `reset` - Delete remote samples and clear the ledger
//! - `health` - Probe the remote sink
//! - `remote` - Count samples held by the remote sink

mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{OutputFormat, SourceArgs};
use tracing_subscriber::EnvFilter;

/// stepsync command-line tools.
#[derive(Parser)]
#[command(name = "stepsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the chunk ledger
    #[arg(
        global = true,
        short,
        long,
        env = "STEPSYNC_LEDGER",
        default_value = "stepsync-ledger.json"
    )]
    ledger: PathBuf,

    /// Base URL of the remote sink
    #[arg(
        global = true,
        short,
        long,
        env = "STEPSYNC_SERVER",
        default_value = "http://localhost:8000"
    )]
    server: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remote sink server until Ctrl-C
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:8000")]
        bind: SocketAddr,

        /// Directory holding the sample store
        #[arg(short, long, env = "STEPSYNC_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Reject request bodies larger than this many bytes
        #[arg(long)]
        max_body_bytes: Option<usize>,
    },

    /// Partition a history window into chunks
    Discover {
        #[command(flatten)]
        source: SourceArgs,

        /// Target units per chunk
        #[arg(short, long, default_value_t = stepsync_engine::DEFAULT_BUDGET)]
        budget: u64,

        /// Width of the buckets used to place chunk cuts
        #[arg(long, default_value = "15")]
        bucket_minutes: i64,
    },

    /// Upload unsynced chunks; Ctrl-C pauses and a rerun resumes
    Sync {
        #[command(flatten)]
        source: SourceArgs,

        /// Chunks transferred concurrently
        #[arg(short, long, default_value_t = stepsync_engine::DEFAULT_MAX_CONCURRENT_CHUNKS)]
        concurrency: usize,
    },

    /// Show progress recorded in the ledger
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete remote samples, then clear the ledger
    Reset {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Probe the remote sink
    Health,

    /// Count samples held by the remote sink
    Remote {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            max_body_bytes,
        } => {
            commands::serve::run(bind, &data_dir, max_body_bytes).await?;
        }
        Commands::Discover {
            source,
            budget,
            bucket_minutes,
        } => {
            commands::discover::run(&cli.ledger, &cli.server, &source, budget, bucket_minutes)
                .await?;
        }
        Commands::Sync {
            source,
            concurrency,
        } => {
            commands::sync::run(&cli.ledger, &cli.server, &source, concurrency).await?;
        }
        Commands::Status { format } => {
            commands::status::run(&cli.ledger, format)?;
        }
        Commands::Reset { source } => {
            commands::reset::run(&cli.ledger, &cli.server, &source).await?;
        }
        Commands::Health => {
            commands::health::run(&cli.server).await?;
        }
        Commands::Remote { format } => {
            commands::remote::run(&cli.server, format).await?;
        }
    }

    Ok(())
}
