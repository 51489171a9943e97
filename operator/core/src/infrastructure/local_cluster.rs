// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Cluster
//!
//! In-process stand-in for the cluster API: stores rollouts, agents, channels
//! and routings, implements every collaborator trait of the domain layer, and
//! publishes a [`ClusterEvent`] for each change so the controllers react as
//! they would to a watch stream.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Development and test backend for the operator
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! State can be seeded from a directory of YAML manifests; each file may hold
//! several `---` separated documents of kind `Rollout`, `Agent` or `Channel`.

use crate::domain::agent::{AgentResource, AGENT_KIND};
use crate::domain::channel::{ChannelResource, ChannelRouting, ChannelStatus, CHANNEL_KIND};
use crate::domain::events::ClusterEvent;
use crate::domain::repository::{
    AgentRepository, ChannelRepository, RepositoryError, RolloutInspector,
};
use crate::domain::resource::ObjectKey;
use crate::domain::rollout::{Rollout, ROLLOUT_KIND};
use crate::infrastructure::event_bus::EventBus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Annotation overriding the base URL of the service fronting a rollout
pub const SERVICE_URL_ANNOTATION: &str = "capwire.io/service-url";

pub const DEFAULT_SERVICE_PORT: u16 = 8080;

#[derive(Default)]
struct ClusterState {
    rollouts: BTreeMap<ObjectKey, Rollout>,
    agents: BTreeMap<ObjectKey, AgentResource>,
    channels: BTreeMap<ObjectKey, ChannelResource>,
    routings: BTreeMap<ObjectKey, ChannelRouting>,
}

pub struct LocalCluster {
    state: RwLock<ClusterState>,
    event_bus: Arc<EventBus>,
}

impl LocalCluster {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            state: RwLock::new(ClusterState::default()),
            event_bus,
        }
    }

    pub fn apply_rollout(&self, rollout: Rollout) {
        let key = rollout.key();
        self.state.write().rollouts.insert(key.clone(), rollout);
        debug!(rollout = %key, "Rollout applied");
        self.event_bus
            .publish_cluster_event(ClusterEvent::RolloutApplied { key });
    }

    pub fn delete_rollout(&self, key: &ObjectKey) -> Option<Rollout> {
        let removed = self.state.write().rollouts.remove(key);
        if let Some(rollout) = &removed {
            debug!(rollout = %key, "Rollout deleted");
            self.event_bus
                .publish_cluster_event(ClusterEvent::RolloutDeleted {
                    rollout: Box::new(rollout.clone()),
                });
        }
        removed
    }

    /// Store a channel; the status of an existing channel is kept
    pub fn apply_channel(&self, mut channel: ChannelResource) {
        let key = channel.key();
        {
            let mut state = self.state.write();
            if let Some(existing) = state.channels.get(&key) {
                channel.status = existing.status.clone();
            }
            state.channels.insert(key.clone(), channel);
        }
        debug!(channel = %key, "Channel applied");
        self.event_bus
            .publish_cluster_event(ClusterEvent::ChannelApplied { key });
    }

    pub fn delete_channel(&self, key: &ObjectKey) -> Option<ChannelResource> {
        let removed = self.state.write().channels.remove(key);
        if removed.is_some() {
            self.event_bus
                .publish_cluster_event(ClusterEvent::ChannelDeleted { key: key.clone() });
        }
        removed
    }

    pub fn apply_agent(&self, agent: AgentResource) {
        let key = agent.key();
        self.state.write().agents.insert(key.clone(), agent);
        self.event_bus
            .publish_cluster_event(ClusterEvent::AgentApplied { key });
    }

    pub fn rollouts(&self) -> Vec<Rollout> {
        self.state.read().rollouts.values().cloned().collect()
    }

    pub fn agent(&self, key: &ObjectKey) -> Option<AgentResource> {
        self.state.read().agents.get(key).cloned()
    }

    pub fn channel(&self, key: &ObjectKey) -> Option<ChannelResource> {
        self.state.read().channels.get(key).cloned()
    }

    /// Apply every manifest found in `dir` (`*.yaml` / `*.yml`, sorted by name).
    /// Returns the number of objects applied.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read manifest directory {:?}", dir))?
        {
            let path = entry?.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if path.is_file() && is_yaml {
                files.push(path);
            }
        }
        files.sort();

        let mut applied = 0;
        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read manifest {:?}", path))?;
            applied += self
                .load_str(&content)
                .with_context(|| format!("Failed to apply manifest {:?}", path))?;
        }
        info!(dir = ?dir, objects = applied, "Cluster state loaded");
        Ok(applied)
    }

    /// Apply every document of a multi-document YAML string
    pub fn load_str(&self, yaml: &str) -> Result<usize> {
        let mut applied = 0;
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            self.apply_value(value)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn apply_value(&self, value: serde_yaml::Value) -> Result<()> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .map(str::to_string)
            .context("manifest document has no kind")?;

        match kind.as_str() {
            ROLLOUT_KIND => self.apply_rollout(serde_yaml::from_value(value)?),
            AGENT_KIND => self.apply_agent(serde_yaml::from_value(value)?),
            CHANNEL_KIND => self.apply_channel(serde_yaml::from_value(value)?),
            other => anyhow::bail!("unsupported manifest kind '{}'", other),
        }
        Ok(())
    }
}

fn default_service_base(rollout: &Rollout) -> String {
    format!(
        "http://{}.{}.svc.cluster.local:{}/",
        rollout.metadata.name, rollout.metadata.namespace, DEFAULT_SERVICE_PORT
    )
}

#[async_trait]
impl AgentRepository for LocalCluster {
    async fn list(&self, namespace: &str) -> Result<Vec<AgentResource>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .agents
            .values()
            .filter(|a| a.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<AgentResource>, RepositoryError> {
        Ok(self.state.read().agents.values().cloned().collect())
    }

    async fn create(&self, agent: &AgentResource) -> Result<(), RepositoryError> {
        self.apply_agent(agent.clone());
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), RepositoryError> {
        let removed = self.state.write().agents.remove(key);
        if removed.is_some() {
            self.event_bus
                .publish_cluster_event(ClusterEvent::AgentDeleted { key: key.clone() });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelRepository for LocalCluster {
    async fn list(&self, namespace: &str) -> Result<Vec<ChannelResource>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .channels
            .values()
            .filter(|c| c.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn find(&self, key: &ObjectKey) -> Result<Option<ChannelResource>, RepositoryError> {
        Ok(self.state.read().channels.get(key).cloned())
    }

    async fn update_status(&self, key: &ObjectKey, status: ChannelStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        let channel = state
            .channels
            .get_mut(key)
            .ok_or_else(|| RepositoryError::NotFound(format!("channel {}", key)))?;
        channel.status = Some(status);
        Ok(())
    }

    async fn save_routing(&self, routing: &ChannelRouting) -> Result<(), RepositoryError> {
        self.state
            .write()
            .routings
            .insert(routing.key(), routing.clone());
        Ok(())
    }

    async fn find_routing(&self, key: &ObjectKey) -> Result<Option<ChannelRouting>, RepositoryError> {
        Ok(self.state.read().routings.get(key).cloned())
    }

    async fn delete_routing(&self, key: &ObjectKey) -> Result<(), RepositoryError> {
        self.state.write().routings.remove(key);
        Ok(())
    }
}

#[async_trait]
impl RolloutInspector for LocalCluster {
    async fn list_all(&self) -> Result<Vec<Rollout>, RepositoryError> {
        Ok(self.rollouts())
    }

    async fn find(&self, key: &ObjectKey) -> Result<Option<Rollout>, RepositoryError> {
        Ok(self.state.read().rollouts.get(key).cloned())
    }

    async fn is_ready(&self, rollout: &Rollout) -> bool {
        let state = self.state.read();
        state
            .rollouts
            .get(&rollout.key())
            .unwrap_or(rollout)
            .status_ready()
    }

    async fn service_url(&self, rollout: &Rollout, path: &str) -> Result<Url, RepositoryError> {
        if rollout.metadata.name.is_empty() {
            return Err(RepositoryError::AddressUnresolved(
                "rollout has no name".to_string(),
            ));
        }

        let mut base = rollout
            .metadata
            .annotations
            .get(SERVICE_URL_ANNOTATION)
            .cloned()
            .unwrap_or_else(|| default_service_base(rollout));
        if !base.ends_with('/') {
            base.push('/');
        }

        let url = Url::parse(&base)?.join(path.trim_start_matches('/'))?;
        Ok(url)
    }
}
