// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Offline channel resolution
//!
//! Runs the resolver over manifests on disk and prints the routing the
//! operator would publish, or the requirements it would alert on.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use capwire_core::domain::agent::{AgentResource, AGENT_KIND};
use capwire_core::domain::channel::{ChannelResource, ChannelRouting};
use capwire_core::domain::resolver::{Resolver, ResolverError};

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Channel manifest
    #[arg(long, value_name = "FILE")]
    pub channel: PathBuf,

    /// Agent manifests (files or directories, repeatable)
    #[arg(long = "agents", value_name = "PATH", required = true)]
    pub agents: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Yaml,
}

pub async fn execute(args: ResolveArgs) -> Result<()> {
    let channel = load_channel(&args.channel)?;
    let pool: Vec<AgentResource> = load_agents(&args.agents)?
        .into_iter()
        .filter(|agent| agent.metadata.namespace == channel.namespace())
        .collect();

    match resolve(&channel, &pool) {
        Ok(routing) => {
            match args.output {
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&routing)?),
                OutputFormat::Text => print_routing(&routing),
            }
            Ok(())
        }
        Err(err) => {
            println!(
                "{}",
                format!("✗ Channel '{}' is unresolved", channel.metadata.key()).red()
            );
            for missing in err.unresolved() {
                println!("  - {}", missing);
            }
            anyhow::bail!("{}", err)
        }
    }
}

/// Resolve `channel` against `pool`, producing the routing a successful
/// reconcile would publish.
pub fn resolve(channel: &ChannelResource, pool: &[AgentResource]) -> Result<ChannelRouting, ResolverError> {
    let wires = Resolver::new().resolve(&channel.spec.required_capabilities, pool, &channel.scope())?;
    Ok(ChannelRouting::from_wires(channel, wires.as_slice()))
}

pub fn load_channel(path: &Path) -> Result<ChannelResource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read channel manifest {:?}", path))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse channel manifest {:?}", path))
}

/// Collect every `Agent` document under `paths`; other kinds are skipped.
pub fn load_agents(paths: &[PathBuf]) -> Result<Vec<AgentResource>> {
    let mut agents = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {:?}", path))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
                })
                .collect();
            files.sort();
            for file in files {
                agents.extend(parse_agents(&file)?);
            }
        } else {
            agents.extend(parse_agents(path)?);
        }
    }
    Ok(agents)
}

fn parse_agents(path: &Path) -> Result<Vec<AgentResource>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent manifest {:?}", path))?;

    let mut agents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        if value.get("kind").and_then(|k| k.as_str()) != Some(AGENT_KIND) {
            continue;
        }
        agents.push(
            serde_yaml::from_value(value)
                .with_context(|| format!("Invalid agent manifest in {:?}", path))?,
        );
    }
    Ok(agents)
}

fn print_routing(routing: &ChannelRouting) {
    println!(
        "{}",
        format!("✓ Channel '{}' resolved", routing.metadata.key()).green()
    );
    for group in &routing.spec.capability_groups {
        println!("  {} ({})", group.name.bold(), group.id);
        for capability in &group.capabilities {
            println!(
                "    {} {} → {}",
                capability.id, capability.required_version, capability.provided_version
            );
        }
    }
}
