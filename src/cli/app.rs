//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{check, inspect, resolve};
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "parcel")]
#[command(author, version, about = "Resolve bindle invoices into parcel selections")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file to use instead of .parcel/config.toml
    #[arg(long, global = true, env = "PARCEL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an invoice and its group graph
    Check {
        /// Path to the invoice TOML
        invoice: PathBuf,
    },

    /// List groups with their policy and members
    Groups {
        /// Path to the invoice TOML
        invoice: PathBuf,
    },

    /// List membership and requirement edges
    Graph {
        /// Path to the invoice TOML
        invoice: PathBuf,
    },

    /// Compute the parcels to install
    Resolve(resolve::ResolveArgs),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format, cli.verbose);

    match &config.source {
        Some(path) => output.verbose(&format!("Using config: {}", path.display())),
        None => output.verbose("No project config found, using defaults"),
    }

    match cli.command {
        Commands::Check { invoice } => check::run(&output, &invoice)?,
        Commands::Groups { invoice } => inspect::groups(&output, &invoice)?,
        Commands::Graph { invoice } => inspect::graph(&output, &invoice)?,
        Commands::Resolve(args) => resolve::run(&output, &config, args)?,
    }

    Ok(())
}

/// Sends library diagnostics to stderr; `--verbose` turns on debug events
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("parcel_resolver=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A subscriber may already be set when the CLI is driven from tests
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
