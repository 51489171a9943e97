// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cluster Collaborator Interfaces
//!
//! Contracts through which the operator reads and writes cluster state. The
//! core never talks to a cluster directly; implementations are injected.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `AgentRepository` | `AgentResource` | `LocalCluster` |
//! | `ChannelRepository` | `ChannelResource`, `ChannelRouting` | `LocalCluster` |
//! | `RolloutInspector` | `Rollout` | `LocalCluster` |
//! | `ManifestClient` | `AgentSpecification` | `HttpManifestClient` |
//!
//! The agent pool is the only shared mutable state: it is written by the
//! rollout reconciler alone and read by the channel reconciler. No caching is
//! assumed; every call observes current state.

use async_trait::async_trait;
use url::Url;
use crate::domain::agent::{AgentResource, AgentSpecification};
use crate::domain::channel::{ChannelResource, ChannelRouting, ChannelStatus};
use crate::domain::resource::ObjectKey;
use crate::domain::rollout::Rollout;

/// Repository interface for Agent resources (the provider pool)
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// List all agents in a namespace, in a stable order
    async fn list(&self, namespace: &str) -> Result<Vec<AgentResource>, RepositoryError>;

    /// List agents across every namespace
    async fn list_all(&self) -> Result<Vec<AgentResource>, RepositoryError>;

    /// Create the agent, replacing any existing agent with the same key
    async fn create(&self, agent: &AgentResource) -> Result<(), RepositoryError>;

    /// Delete the agent backing a rollout; deleting a missing agent succeeds
    async fn delete(&self, key: &ObjectKey) -> Result<(), RepositoryError>;
}

/// Repository interface for Channels and their published routings
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn list(&self, namespace: &str) -> Result<Vec<ChannelResource>, RepositoryError>;

    async fn find(&self, key: &ObjectKey) -> Result<Option<ChannelResource>, RepositoryError>;

    async fn update_status(&self, key: &ObjectKey, status: ChannelStatus) -> Result<(), RepositoryError>;

    /// Create or replace the routing published for a channel
    async fn save_routing(&self, routing: &ChannelRouting) -> Result<(), RepositoryError>;

    async fn find_routing(&self, key: &ObjectKey) -> Result<Option<ChannelRouting>, RepositoryError>;

    /// Withdraw a published routing; a missing routing is not an error
    async fn delete_routing(&self, key: &ObjectKey) -> Result<(), RepositoryError>;
}

/// Read access to the rollout controller's view of a rollout
#[async_trait]
pub trait RolloutInspector: Send + Sync {
    /// Every stored rollout, across namespaces
    async fn list_all(&self) -> Result<Vec<Rollout>, RepositoryError>;

    async fn find(&self, key: &ObjectKey) -> Result<Option<Rollout>, RepositoryError>;

    async fn is_ready(&self, rollout: &Rollout) -> bool;

    /// Address of `path` on the service fronting the rollout
    async fn service_url(&self, rollout: &Rollout, path: &str) -> Result<Url, RepositoryError>;
}

/// Fetches the capability manifest an agent serves about itself
#[async_trait]
pub trait ManifestClient: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<AgentSpecification, ManifestError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("manifest at {url} is not valid JSON: {reason}")]
    Decode { url: String, reason: String },
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service address unresolved: {0}")]
    AddressUnresolved(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<serde_yaml::Error> for RepositoryError {
    fn from(err: serde_yaml::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for RepositoryError {
    fn from(err: url::ParseError) -> Self {
        RepositoryError::AddressUnresolved(err.to_string())
    }
}
