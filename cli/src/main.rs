// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # capwire operator
//!
//! The `capwire` binary hosts the operator process and a few offline helpers.
//!
//! ## Commands
//!
//! - `capwire run` - Start the rollout and channel controllers plus the routing API
//! - `capwire resolve` - Resolve a channel manifest against agent manifests without a cluster
//! - `capwire config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use capwire::commands::{self, ConfigCommand, ResolveArgs, RunArgs};
use capwire::LogFormat;

/// capwire - Capability wiring for agent rollouts
#[derive(Parser)]
#[command(name = "capwire")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CAPWIRE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CAPWIRE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(
        long,
        global = true,
        env = "CAPWIRE_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the operator
    #[command(name = "run")]
    Run(RunArgs),

    /// Resolve a channel offline
    #[command(name = "resolve")]
    Resolve(ResolveArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::execute(args, cli.config).await,
        Some(Commands::Resolve(args)) => commands::resolve::execute(args).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
