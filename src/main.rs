//! taxrag CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taxrag::{
    commands::{cmd_ingest, cmd_sample, cmd_verify},
    config::Config,
    error::Result,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "taxrag")]
#[command(version, about = "Internal Revenue Code ingestion pipeline for RAG", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a directory of Title 26 HTML files and load them into Qdrant
    Ingest {
        /// Root of the HTML corpus
        root: PathBuf,

        /// Worker pool size (defaults to all available execution units)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Copy a smoke-test subset of the HTML corpus
    Sample {
        /// Root of the HTML corpus
        root: PathBuf,

        /// Directory to copy the subset into
        target: PathBuf,

        /// Number of files to copy
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Run a semantic-search smoke check against the loaded index
    Verify {
        /// Probe query to embed and search
        #[arg(long, default_value = "How are dependents defined?")]
        query: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config::default();

    match cli.command {
        Commands::Ingest { root, workers } => {
            let stats = cmd_ingest(&config, &root, workers).await?;

            println!("\n✓ Ingestion complete");
            println!("  Files discovered: {}", stats.files_discovered);
            println!("  Sections parsed: {}", stats.sections_parsed);
            println!("  Points uploaded: {}", stats.points_uploaded);
            if stats.failed_batches > 0 {
                println!("  Failed batches: {}", stats.failed_batches);
            }
        }

        Commands::Sample {
            root,
            target,
            count,
        } => {
            let copied = cmd_sample(&root, &target, count)?;
            println!("✓ Copied {}/{} files to {}", copied, count, target.display());
        }

        Commands::Verify { query } => {
            cmd_verify(&config, &query).await?;
        }
    }

    Ok(())
}
