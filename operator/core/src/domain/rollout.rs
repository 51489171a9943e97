// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Argo-style `Rollout` objects observed by the operator, and the phase a
//! rollout's backing agent is in.

use crate::domain::resource::{ObjectKey, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROLLOUT_API_VERSION: &str = "argoproj.io/v1alpha1";
pub const ROLLOUT_KIND: &str = "Rollout";

/// Only rollouts carrying this label are reconciled into agents.
pub const AGENT_ROLLOUT_LABEL_KEY: &str = "capwire-agent";
pub const AGENT_ROLLOUT_LABEL_VALUE: &str = "true";

/// Path, relative to the rollout's service, of the agent manifest.
pub const WELL_KNOWN_CAPABILITIES_PATH: &str = ".well-known/capabilities.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RolloutSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RolloutStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl Rollout {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::new(namespace, name),
            spec: RolloutSpec::default(),
            status: None,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_agent_rollout(&self) -> bool {
        self.metadata.label(AGENT_ROLLOUT_LABEL_KEY) == Some(AGENT_ROLLOUT_LABEL_VALUE)
    }

    /// Readiness as reported by the rollout controller's status block.
    ///
    /// A `Healthy` phase is ready outright; otherwise every desired replica
    /// must be ready. A rollout without status is never ready.
    pub fn status_ready(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        if status.phase.as_deref() == Some("Healthy") {
            return true;
        }
        let desired = self.spec.replicas.or(status.replicas).unwrap_or(0);
        desired > 0 && status.ready_replicas.unwrap_or(0) >= desired
    }
}

/// Phase of the agent backing a rollout, as driven by the rollout reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutPhase {
    /// Rollout not ready yet; readiness is polled.
    NotReady,
    /// Agent resource submitted for the current manifest.
    Ready,
    /// Last tick failed; the retry runtime will tick again.
    Failed,
    /// Rollout deleted and its agent removed. Terminal; the phase is not retained.
    Cleaned,
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RolloutPhase::NotReady => "NotReady",
            RolloutPhase::Ready => "Ready",
            RolloutPhase::Failed => "Failed",
            RolloutPhase::Cleaned => "Cleaned",
        };
        f.write_str(label)
    }
}

fn default_api_version() -> String {
    ROLLOUT_API_VERSION.to_string()
}

fn default_kind() -> String {
    ROLLOUT_KIND.to_string()
}
