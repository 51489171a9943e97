// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent (capability provider)
//!
//! Two shapes describe a provider:
//!
//! - [`AgentSpecification`]: the manifest an agent serves at
//!   `/.well-known/capabilities.json`.
//! - [`AgentResource`]: the cluster resource the operator materializes from a
//!   ready rollout plus that manifest.
//!
//! An `AgentResource` is never edited in place; a changed manifest produces a
//! replacement resource under the same name.

use crate::domain::capability::ProvidedCapability;
use crate::domain::resource::{ObjectKey, ObjectMeta, OwnerReference};
use crate::domain::rollout::Rollout;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const AGENT_API_VERSION: &str = "capwire.io/v1";
pub const AGENT_KIND: &str = "Agent";

/// Manifest published by a running agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpecification {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_tenants: BTreeSet<String>,
    #[serde(default)]
    pub supported_channels: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: Vec<ProvidedCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentSpecificationError {
    #[error("agent manifest has an empty id")]
    MissingId,

    #[error("capability '{0}' is declared more than once")]
    DuplicateCapability(String),

    #[error("capability at position {0} has an empty id")]
    MissingCapabilityId(usize),
}

impl AgentSpecification {
    /// Capability ids must be present and unique within one agent.
    pub fn validate(&self) -> Result<(), AgentSpecificationError> {
        if self.id.trim().is_empty() {
            return Err(AgentSpecificationError::MissingId);
        }
        let mut seen = HashSet::new();
        for (position, capability) in self.capabilities.iter().enumerate() {
            if capability.id.trim().is_empty() {
                return Err(AgentSpecificationError::MissingCapabilityId(position));
            }
            if !seen.insert(capability.id.as_str()) {
                return Err(AgentSpecificationError::DuplicateCapability(capability.id.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_tenants: BTreeSet<String>,
    #[serde(default)]
    pub supported_channels: BTreeSet<String>,
    #[serde(default)]
    pub provided_capabilities: Vec<ProvidedCapability>,
}

/// Cluster resource representing one deployed provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: AgentSpec,
}

impl AgentResource {
    pub fn new(metadata: ObjectMeta, spec: AgentSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata,
            spec,
        }
    }

    /// Build the provider resource backing `rollout`.
    ///
    /// The agent takes the rollout's name, namespace and labels (so the
    /// subset label carries over) and is owned by the rollout.
    pub fn from_rollout(
        rollout: &Rollout,
        manifest: AgentSpecification,
    ) -> Result<Self, AgentSpecificationError> {
        manifest.validate()?;

        let mut metadata = ObjectMeta::new(
            rollout.metadata.namespace.clone(),
            rollout.metadata.name.clone(),
        );
        metadata.labels = rollout.metadata.labels.clone();
        metadata.owner_references.push(OwnerReference {
            api_version: rollout.api_version.clone(),
            kind: rollout.kind.clone(),
            name: rollout.metadata.name.clone(),
        });

        Ok(Self::new(
            metadata,
            AgentSpec {
                id: manifest.id,
                description: manifest.description,
                supported_tenants: manifest.supported_tenants,
                supported_channels: manifest.supported_channels,
                provided_capabilities: manifest.capabilities,
            },
        ))
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn capability(&self, id: &str) -> Option<&ProvidedCapability> {
        self.spec.provided_capabilities.iter().find(|c| c.id == id)
    }
}

fn default_api_version() -> String {
    AGENT_API_VERSION.to_string()
}

fn default_kind() -> String {
    AGENT_KIND.to_string()
}
