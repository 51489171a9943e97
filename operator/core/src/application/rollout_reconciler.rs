// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rollout-to-Agent reconciliation
//!
//! One tick per observed agent rollout:
//!
//! ```text
//! not ready ──▶ NotReady, requeue after a fixed delay
//! ready ──▶ service url ──▶ fetch manifest ──▶ build agent ──▶ create
//!              │                 │                 │             │
//!              └────── any failure ──▶ Failed, error to the runtime
//! all steps ok ──▶ Ready, no further update
//! deleted ──▶ delete agent ──▶ Cleaned, phase dropped
//! ```
//!
//! Phases are tracked only for rollouts that still exist.
//!
//! Agent creation replaces an existing agent of the same name, so repeated
//! ready ticks converge on the latest manifest instead of failing.

use crate::application::controller::{Action, ReconcileError};
use crate::domain::agent::AgentResource;
use crate::domain::events::OperatorEvent;
use crate::domain::operator_config::RolloutConfig;
use crate::domain::repository::{
    AgentRepository, ManifestClient, RepositoryError, RolloutInspector,
};
use crate::domain::resource::ObjectKey;
use crate::domain::rollout::{Rollout, RolloutPhase, ROLLOUT_KIND};
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct AgentRolloutReconciler {
    agents: Arc<dyn AgentRepository>,
    rollouts: Arc<dyn RolloutInspector>,
    manifests: Arc<dyn ManifestClient>,
    event_bus: Arc<EventBus>,
    manifest_path: String,
    not_ready_requeue: Duration,
    phases: RwLock<HashMap<ObjectKey, RolloutPhase>>,
}

impl AgentRolloutReconciler {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        rollouts: Arc<dyn RolloutInspector>,
        manifests: Arc<dyn ManifestClient>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::with_config(agents, rollouts, manifests, event_bus, &RolloutConfig::default())
    }

    pub fn with_config(
        agents: Arc<dyn AgentRepository>,
        rollouts: Arc<dyn RolloutInspector>,
        manifests: Arc<dyn ManifestClient>,
        event_bus: Arc<EventBus>,
        config: &RolloutConfig,
    ) -> Self {
        Self {
            agents,
            rollouts,
            manifests,
            event_bus,
            manifest_path: config.manifest_path.clone(),
            not_ready_requeue: config.not_ready_requeue(),
            phases: RwLock::new(HashMap::new()),
        }
    }

    /// Last phase reached by a live rollout; `None` once it is cleaned up
    pub fn phase(&self, key: &ObjectKey) -> Option<RolloutPhase> {
        self.phases.read().get(key).copied()
    }

    fn enter(&self, key: &ObjectKey, phase: RolloutPhase) {
        self.phases.write().insert(key.clone(), phase);
    }

    pub async fn reconcile(&self, rollout: &Rollout) -> Result<Action, ReconcileError> {
        let key = rollout.key();

        if !self.rollouts.is_ready(rollout).await {
            info!(
                rollout = %key,
                requeue_secs = self.not_ready_requeue.as_secs(),
                "Rollout is not ready yet, rescheduling"
            );
            self.enter(&key, RolloutPhase::NotReady);
            self.event_bus
                .publish_operator_event(OperatorEvent::RolloutRequeued {
                    rollout: key,
                    delay_secs: self.not_ready_requeue.as_secs(),
                    requeued_at: Utc::now(),
                });
            return Ok(Action::requeue(self.not_ready_requeue));
        }

        match self.materialize(rollout).await {
            Ok(agent) => {
                info!(
                    rollout = %key,
                    agent_id = %agent.spec.id,
                    capabilities = agent.spec.provided_capabilities.len(),
                    "Agent resource created"
                );
                self.enter(&key, RolloutPhase::Ready);
                self.event_bus
                    .publish_operator_event(OperatorEvent::AgentMaterialized {
                        rollout: key,
                        agent_id: agent.spec.id.clone(),
                        capability_count: agent.spec.provided_capabilities.len(),
                        materialized_at: Utc::now(),
                    });
                Ok(Action::NoUpdate)
            }
            Err(err) => {
                error!(rollout = %key, error = %err, "Rollout reconciliation failed");
                self.enter(&key, RolloutPhase::Failed);
                Err(err)
            }
        }
    }

    async fn materialize(&self, rollout: &Rollout) -> Result<AgentResource, ReconcileError> {
        let name = rollout.name().to_string();

        let url = self
            .rollouts
            .service_url(rollout, &self.manifest_path)
            .await
            .map_err(|source| ReconcileError::ServiceAddressUnresolved {
                rollout: name.clone(),
                source,
            })?;

        let manifest = self.manifests.fetch(&url).await.map_err(|source| {
            ReconcileError::ManifestFetchFailed {
                rollout: name.clone(),
                source,
            }
        })?;

        let agent = AgentResource::from_rollout(rollout, manifest).map_err(|source| {
            ReconcileError::InvalidManifest {
                rollout: name.clone(),
                source,
            }
        })?;

        self.agents
            .create(&agent)
            .await
            .map_err(|source| ReconcileError::AgentCreationFailed {
                rollout: name,
                source,
            })?;

        Ok(agent)
    }

    /// Delete the agent backing a removed rollout, whatever phase it was in
    pub async fn cleanup(&self, rollout: &Rollout) -> Result<(), ReconcileError> {
        let key = rollout.key();
        self.remove_agent(&key, &key).await
    }

    /// Delete every agent owned by a rollout that is not in `live`.
    /// Returns the keys of the agents removed.
    pub async fn remove_orphans(
        &self,
        live: &HashSet<ObjectKey>,
    ) -> Result<Vec<ObjectKey>, RepositoryError> {
        let mut removed = Vec::new();
        for agent in self.agents.list_all().await? {
            let Some(owner) = agent
                .metadata
                .owner_references
                .iter()
                .find(|owner| owner.kind == ROLLOUT_KIND)
            else {
                continue;
            };
            let owner_key = ObjectKey::new(agent.metadata.namespace.as_str(), owner.name.as_str());
            if live.contains(&owner_key) {
                continue;
            }

            let agent_key = agent.metadata.key();
            warn!(rollout = %owner_key, agent = %agent_key, "Agent outlived its rollout");
            match self.remove_agent(&owner_key, &agent_key).await {
                Ok(()) => removed.push(owner_key),
                Err(err) => error!(rollout = %owner_key, error = %err, "Orphaned agent cleanup failed"),
            }
        }
        Ok(removed)
    }

    async fn remove_agent(&self, key: &ObjectKey, agent: &ObjectKey) -> Result<(), ReconcileError> {
        self.agents
            .delete(agent)
            .await
            .map_err(|source| ReconcileError::AgentDeletionFailed {
                rollout: key.name.clone(),
                source,
            })?;

        self.phases.write().remove(key);
        info!(rollout = %key, phase = %RolloutPhase::Cleaned, "Agent resource deleted");
        self.event_bus
            .publish_operator_event(OperatorEvent::AgentRemoved {
                rollout: key.clone(),
                removed_at: Utc::now(),
            });
        Ok(())
    }
}
