//! deckhand CLI
//!
//! Command-line interface for validating manifests and launching, stopping
//! and inspecting container clusters.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::{resolve, start, status, stop, validate};

/// Declarative container cluster orchestration.
#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Manifest file to read cluster configuration from (YAML or JSON)
    #[arg(
        short,
        long,
        env = "DECKHAND_CONFIG",
        default_value = "deckhand.yaml",
        global = true
    )]
    config: PathBuf,

    /// Use the in-memory mock runtime instead of docker (dry run)
    #[arg(long, global = true)]
    mock: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest and report every issue found
    Validate,

    /// Print the effective container specs for a cluster
    Resolve(resolve::ResolveArgs),

    /// Launch a cluster's containers in dependency order
    Start(start::StartArgs),

    /// Stop and remove a cluster's containers, dependents first
    Stop(stop::StopArgs),

    /// Show container states for one or all clusters
    Status(status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match cli.command {
        Commands::Validate => validate::execute(&cli.config).await,
        Commands::Resolve(args) => resolve::execute(args, &cli.config, cli.format).await,
        Commands::Start(args) => start::execute(args, &cli.config, cli.mock).await,
        Commands::Stop(args) => stop::execute(args, &cli.config, cli.mock).await,
        Commands::Status(args) => status::execute(args, &cli.config, cli.mock, cli.format).await,
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }

    Ok(())
}
