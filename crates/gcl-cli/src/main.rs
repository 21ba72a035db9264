use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::config::ConfigCommand;
use commands::stress::StressCommand;

#[derive(Parser)]
#[command(name = "gcl", version, about = "Exercise gc-listen on a managed heap")]
struct Cli {
    /// Path to gcl.toml (searched in the current directory and its parents by default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register listeners on garbage, collect, and check every one fires once
    Stress(StressCommand),
    /// Print the effective configuration
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stress(cmd) => cmd.run(&config)?,
        Commands::Config(cmd) => cmd.run(&config)?,
    }

    Ok(())
}
