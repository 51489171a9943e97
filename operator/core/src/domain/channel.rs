// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Channel (capability consumer) and its routing
//!
//! A [`ChannelResource`] declares required capabilities and is scoped by its
//! `tenant`, `channel` and subset labels. A successful resolution is published
//! as a [`ChannelRouting`] that groups the resolved wires per agent; the
//! outcome of the last evaluation is kept in [`ChannelStatus`].

use crate::domain::capability::RequiredCapability;
use crate::domain::resolver::Wire;
use crate::domain::resource::{ObjectKey, ObjectMeta, OwnerReference};
use crate::domain::scope::ChannelScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHANNEL_API_VERSION: &str = "capwire.io/v1";
pub const CHANNEL_KIND: &str = "Channel";
pub const CHANNEL_ROUTING_KIND: &str = "ChannelRouting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_channel_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ChannelSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChannelStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    #[serde(default)]
    pub required_capabilities: BTreeSet<RequiredCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveStatus {
    Resolved,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub resolve_status: ResolveStatus,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_required_capabilities: BTreeSet<RequiredCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChannelStatus {
    pub fn resolved() -> Self {
        Self {
            resolve_status: ResolveStatus::Resolved,
            unresolved_required_capabilities: BTreeSet::new(),
            message: None,
        }
    }

    pub fn unresolved(missing: BTreeSet<RequiredCapability>, message: impl Into<String>) -> Self {
        Self {
            resolve_status: ResolveStatus::Unresolved,
            unresolved_required_capabilities: missing,
            message: Some(message.into()),
        }
    }
}

impl ChannelResource {
    pub fn new(metadata: ObjectMeta, required: impl IntoIterator<Item = RequiredCapability>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_channel_kind(),
            metadata,
            spec: ChannelSpec {
                required_capabilities: required.into_iter().collect(),
            },
            status: None,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn scope(&self) -> ChannelScope {
        ChannelScope::from_metadata(&self.metadata)
    }
}

/// Published result of a successful resolution, one group per agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRouting {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_routing_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ChannelRoutingSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRoutingSpec {
    pub capability_groups: Vec<CapabilityGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityGroup {
    /// Agent id from its manifest.
    pub id: String,
    /// Agent resource name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub capabilities: Vec<RoutedCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedCapability {
    pub id: String,
    pub name: String,
    pub required_version: String,
    pub provided_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl ChannelRouting {
    /// Group `wires` by agent, keeping first-seen agent order.
    pub fn from_wires(channel: &ChannelResource, wires: &[Wire]) -> Self {
        let mut groups: Vec<CapabilityGroup> = Vec::new();
        for wire in wires {
            let routed = RoutedCapability {
                id: wire.provided.id.clone(),
                name: wire.provided.name.clone(),
                required_version: wire.required.version.clone(),
                provided_version: wire.provided.version.clone(),
                description: wire.provided.description.clone(),
                examples: wire.provided.examples.clone(),
            };
            match groups.iter_mut().find(|g| g.name == wire.agent.name()) {
                Some(group) => group.capabilities.push(routed),
                None => groups.push(CapabilityGroup {
                    id: wire.agent.spec.id.clone(),
                    name: wire.agent.name().to_string(),
                    description: wire.agent.spec.description.clone(),
                    capabilities: vec![routed],
                }),
            }
        }

        let mut metadata = ObjectMeta::new(channel.namespace(), channel.name());
        metadata.labels = channel.metadata.labels.clone();
        metadata.owner_references.push(OwnerReference {
            api_version: channel.api_version.clone(),
            kind: channel.kind.clone(),
            name: channel.name().to_string(),
        });

        Self {
            api_version: default_api_version(),
            kind: default_routing_kind(),
            metadata,
            spec: ChannelRoutingSpec {
                capability_groups: groups,
            },
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}

fn default_api_version() -> String {
    CHANNEL_API_VERSION.to_string()
}

fn default_channel_kind() -> String {
    CHANNEL_KIND.to_string()
}

fn default_routing_kind() -> String {
    CHANNEL_ROUTING_KIND.to_string()
}
