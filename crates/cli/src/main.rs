//! Pipecheck CLI - Main Entry Point
//!
//! Drives end-to-end verification runs against a Pipeboard console:
//! scenario execution, catalog inspection, and configuration management.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, run, scenarios};

/// Pipecheck - Event Delivery Verification Suite
#[derive(Parser)]
#[command(name = "pipecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "pipecheck.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification scenarios against a console environment
    Run(run::RunArgs),

    /// List the scenario catalog
    Scenarios(scenarios::ScenariosArgs),

    /// Validate the configuration file and print the effective settings
    ValidateConfig,

    /// Write a starter configuration file
    Setup(config::SetupArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config, cli.format).await?,
        Commands::Scenarios(args) => scenarios::execute(args, cli.format)?,
        Commands::ValidateConfig => config::execute_validate(&cli.config, cli.format)?,
        Commands::Setup(args) => config::execute_setup(args, &cli.config)?,
        Commands::Version => {
            println!("Pipecheck CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("End-to-end event delivery verification for Pipeboard");
            println!();
            println!("Scenario markers: smoke, integration, regression");
        }
    }

    Ok(())
}
