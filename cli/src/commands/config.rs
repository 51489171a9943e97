// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use capwire_core::domain::operator_config::OperatorConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with defaults
    Generate {
        /// Output path (default: ./capwire-config.yaml)
        #[arg(short, long, default_value = "./capwire-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OperatorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CAPWIRE_CONFIG_PATH: {}",
            std::env::var("CAPWIRE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./capwire-config.yaml");
        println!("  4. ~/.capwire/config.yaml");
        println!("  5. /etc/capwire/config.yaml");
        println!();
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Alerting:".bold());
    println!(
        "  Webhook: {}",
        spec.alert.webhook_url.as_deref().unwrap_or("(log only)")
    );
    println!("  Timeout: {}ms", spec.alert.timeout_ms);
    println!();

    println!("{}", "Rollout reconciliation:".bold());
    println!("  Enabled: {}", spec.rollout.enabled);
    println!("  Manifest path: {}", spec.rollout.manifest_path);
    println!("  Not-ready requeue: {}s", spec.rollout.not_ready_requeue_secs);
    println!("  Manifest timeout: {}ms", spec.rollout.manifest_timeout_ms);
    println!();

    println!("{}", "Retry:".bold());
    println!("  Initial interval: {}ms", spec.retry.initial_interval_ms);
    println!("  Multiplier: {}", spec.retry.interval_multiplier);
    println!("  Max attempts: {}", spec.retry.max_attempts);
    println!();

    println!("{}", "Routing:".bold());
    println!("  Canary release: {}", spec.routing.canary_release_enabled);
    println!("  Default namespace: {}", spec.routing.default_namespace);
    println!();

    println!("{}", "Channels:".bold());
    println!("  Namespaces: {}", spec.channels.namespaces.join(", "));
    println!("  Resync interval: {}s", spec.channels.resync_interval_secs);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OperatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }

    let sample = OperatorConfigManifest::default()
        .to_yaml_string()
        .context("Failed to render default configuration")?;

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capwire-config.yaml");

        generate(path.clone(), false).await.unwrap();

        let config = OperatorConfigManifest::from_yaml_file(&path).unwrap();
        config.validate().unwrap();
        assert!(generate(path, false).await.is_err());
    }
}
