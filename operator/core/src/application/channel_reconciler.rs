// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Channel evaluation: resolve a channel against the agents of its namespace
//! and publish either a complete routing or an unresolved status plus alert.
//!
//! The webhook alert fires when a channel becomes unresolved or its set of
//! missing requirements changes; re-evaluations that find the same gap only
//! log it.

use crate::application::alert::AlertNotifier;
use crate::application::controller::ReconcileError;
use crate::domain::capability::RequiredCapability;
use crate::domain::channel::{ChannelResource, ChannelRouting, ChannelStatus, ResolveStatus};
use crate::domain::events::OperatorEvent;
use crate::domain::repository::{AgentRepository, ChannelRepository, RepositoryError};
use crate::domain::resolver::Resolver;
use crate::domain::resource::ObjectKey;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Resolved { wires: usize },
    Unresolved { missing: BTreeSet<RequiredCapability> },
}

pub struct ChannelReconciler {
    channels: Arc<dyn ChannelRepository>,
    agents: Arc<dyn AgentRepository>,
    resolver: Resolver,
    notifier: AlertNotifier,
    event_bus: Arc<EventBus>,
}

impl ChannelReconciler {
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        agents: Arc<dyn AgentRepository>,
        resolver: Resolver,
        notifier: AlertNotifier,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            channels,
            agents,
            resolver,
            notifier,
            event_bus,
        }
    }

    pub async fn reconcile(&self, channel: &ChannelResource) -> Result<ChannelOutcome, ReconcileError> {
        let key = channel.key();
        let repository_error = |source: RepositoryError| ReconcileError::Repository {
            object: key.clone(),
            source,
        };

        let pool = self
            .agents
            .list(channel.namespace())
            .await
            .map_err(repository_error)?;

        match self
            .resolver
            .resolve(&channel.spec.required_capabilities, &pool, &channel.scope())
        {
            Ok(wires) => {
                let routing = ChannelRouting::from_wires(channel, wires.as_slice());
                self.channels
                    .save_routing(&routing)
                    .await
                    .map_err(repository_error)?;
                self.channels
                    .update_status(&key, ChannelStatus::resolved())
                    .await
                    .map_err(repository_error)?;

                info!(channel = %key, wires = wires.len(), "Channel resolved");
                self.event_bus
                    .publish_operator_event(OperatorEvent::ChannelResolved {
                        channel: key.clone(),
                        wire_count: wires.len(),
                        resolved_at: Utc::now(),
                    });
                Ok(ChannelOutcome::Resolved { wires: wires.len() })
            }
            Err(failure) => {
                let missing = failure.unresolved().clone();
                let reason = failure.to_string();
                let already_alerted = matches!(
                    &channel.status,
                    Some(status) if status.resolve_status == ResolveStatus::Unresolved
                        && status.unresolved_required_capabilities == missing
                );

                // A stale routing must not outlive the resolution that produced it
                self.channels
                    .delete_routing(&key)
                    .await
                    .map_err(repository_error)?;
                self.channels
                    .update_status(&key, ChannelStatus::unresolved(missing.clone(), reason.clone()))
                    .await
                    .map_err(repository_error)?;

                if already_alerted {
                    self.notifier
                        .notify_unchanged(channel.namespace(), channel.name(), &missing, &reason);
                } else {
                    self.notifier
                        .notify(channel.namespace(), channel.name(), &missing, &reason)
                        .await;
                }
                self.event_bus
                    .publish_operator_event(OperatorEvent::ChannelUnresolved {
                        channel: key.clone(),
                        unresolved: missing.iter().cloned().collect(),
                        reason,
                        evaluated_at: Utc::now(),
                    });
                Ok(ChannelOutcome::Unresolved { missing })
            }
        }
    }

    /// Reconcile the channel stored under `key`; `None` when it no longer exists
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<Option<ChannelOutcome>, ReconcileError> {
        let channel = self
            .channels
            .find(key)
            .await
            .map_err(|source| ReconcileError::Repository {
                object: key.clone(),
                source,
            })?;

        match channel {
            Some(channel) => self.reconcile(&channel).await.map(Some),
            None => {
                debug!(channel = %key, "Channel no longer exists, skipping");
                Ok(None)
            }
        }
    }

    /// Re-evaluate every channel of `namespace`.
    ///
    /// A failing channel is logged and skipped so one bad object does not
    /// starve the rest; only a failure to list the namespace is returned.
    pub async fn reconcile_namespace(
        &self,
        namespace: &str,
    ) -> Result<Vec<(ObjectKey, ChannelOutcome)>, ReconcileError> {
        let channels = self
            .channels
            .list(namespace)
            .await
            .map_err(|source| ReconcileError::Repository {
                object: ObjectKey::new(namespace, "*"),
                source,
            })?;

        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in &channels {
            match self.reconcile(channel).await {
                Ok(outcome) => outcomes.push((channel.key(), outcome)),
                Err(err) => error!(channel = %channel.key(), error = %err, "Channel evaluation failed"),
            }
        }
        Ok(outcomes)
    }

    /// Withdraw the routing of a deleted channel
    pub async fn forget(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        self.channels
            .delete_routing(key)
            .await
            .map_err(|source| ReconcileError::Repository {
                object: key.clone(),
                source,
            })?;
        debug!(channel = %key, "Routing withdrawn");
        Ok(())
    }
}
