// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Controller runtime
//!
//! Turns cluster events into reconcile calls and interprets their outcome:
//!
//! - [`Action::RequeueAfter`] schedules the same object again after the delay
//! - a [`ReconcileError`] is retried with [`RetryPolicy`] backoff; once the
//!   attempt budget is spent the error is published as `ReconcileAbandoned`
//!   and nothing further happens for that object until its next event
//!
//! Each controller handles one work item at a time, so ticks for the same
//! object never overlap. A controller whose event receiver lags resyncs
//! from the stored objects instead of trusting the events it saw.

use crate::application::channel_reconciler::ChannelReconciler;
use crate::application::rollout_reconciler::AgentRolloutReconciler;
use crate::domain::agent::AgentSpecificationError;
use crate::domain::events::{ClusterEvent, OperatorEvent};
use crate::domain::operator_config::RetryConfig;
use crate::domain::repository::{ManifestError, RepositoryError, RolloutInspector};
use crate::domain::resource::ObjectKey;
use crate::domain::rollout::Rollout;
use crate::infrastructure::event_bus::{ClusterEventReceiver, EventBus, EventBusError};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What the runtime should do after a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoUpdate,
    RequeueAfter(Duration),
}

impl Action {
    pub fn requeue(delay: Duration) -> Self {
        Action::RequeueAfter(delay)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to create agent resource for rollout '{rollout}': service address unresolved: {source}")]
    ServiceAddressUnresolved {
        rollout: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to create agent resource for rollout '{rollout}': manifest fetch failed: {source}")]
    ManifestFetchFailed {
        rollout: String,
        #[source]
        source: ManifestError,
    },

    #[error("Failed to create agent resource for rollout '{rollout}': invalid manifest: {source}")]
    InvalidManifest {
        rollout: String,
        #[source]
        source: AgentSpecificationError,
    },

    #[error("Failed to create agent resource for rollout '{rollout}': {source}")]
    AgentCreationFailed {
        rollout: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to delete agent resource for rollout '{rollout}': {source}")]
    AgentDeletionFailed {
        rollout: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to reconcile '{object}': {source}")]
    Repository {
        object: ObjectKey,
        #[source]
        source: RepositoryError,
    },
}

/// Exponential backoff for failed reconciles
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            multiplier: config.interval_multiplier,
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based), or `None` once `max_attempts` have failed.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        Some(self.initial_interval.mul_f64(factor))
    }
}

/// One scheduled reconcile of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub key: ObjectKey,
    /// 1 for a fresh tick, incremented on every retry
    pub attempt: u32,
}

impl ReconcileRequest {
    pub fn new(key: ObjectKey) -> Self {
        Self { key, attempt: 1 }
    }

    fn retry(&self) -> Self {
        Self {
            key: self.key.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Defers a reconcile request
///
/// At most one request per object is pending: scheduling an object that
/// already has a pending request replaces it.
pub trait ReconcileScheduler: Send + Sync {
    fn schedule(&self, request: ReconcileRequest, delay: Duration);

    /// Drop the pending request for `key`, if any
    fn cancel(&self, _key: &ObjectKey) {}
}

#[derive(Default)]
struct PendingRequeues {
    generation: u64,
    by_key: HashMap<ObjectKey, u64>,
}

/// Scheduler that sleeps on the tokio runtime and feeds the request back
/// into a controller's work queue.
#[derive(Clone)]
pub struct TokioScheduler {
    queue: mpsc::UnboundedSender<ReconcileRequest>,
    pending: Arc<Mutex<PendingRequeues>>,
}

impl TokioScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReconcileRequest>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            queue,
            pending: Arc::new(Mutex::new(PendingRequeues::default())),
        };
        (scheduler, rx)
    }

    /// Number of objects with a request waiting to fire
    pub fn pending(&self) -> usize {
        self.pending.lock().by_key.len()
    }
}

impl ReconcileScheduler for TokioScheduler {
    fn schedule(&self, request: ReconcileRequest, delay: Duration) {
        let generation = {
            let mut pending = self.pending.lock();
            pending.generation += 1;
            let generation = pending.generation;
            if pending.by_key.insert(request.key.clone(), generation).is_some() {
                debug!(object = %request.key, "Replacing pending reconcile");
            }
            generation
        };

        let queue = self.queue.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = pending.lock();
                if pending.by_key.get(&request.key) != Some(&generation) {
                    // Superseded or cancelled
                    return;
                }
                pending.by_key.remove(&request.key);
            }
            if queue.send(request).is_err() {
                debug!("Controller queue closed, dropping scheduled reconcile");
            }
        });
    }

    fn cancel(&self, key: &ObjectKey) {
        if self.pending.lock().by_key.remove(key).is_some() {
            debug!(object = %key, "Pending reconcile cancelled");
        }
    }
}

/// Shared outcome handling for both controllers
struct Requeuer {
    scheduler: Arc<dyn ReconcileScheduler>,
    retry: RetryPolicy,
    event_bus: Arc<EventBus>,
}

impl Requeuer {
    fn on_action(&self, request: &ReconcileRequest, action: Action) {
        match action {
            Action::RequeueAfter(delay) => self
                .scheduler
                .schedule(ReconcileRequest::new(request.key.clone()), delay),
            Action::NoUpdate => self.scheduler.cancel(&request.key),
        }
    }

    fn on_error(&self, request: &ReconcileRequest, err: &ReconcileError) {
        self.event_bus
            .publish_operator_event(OperatorEvent::ReconcileFailed {
                object: request.key.clone(),
                attempt: request.attempt,
                error: err.to_string(),
                failed_at: Utc::now(),
            });

        match self.retry.backoff(request.attempt) {
            Some(delay) => {
                warn!(
                    object = %request.key,
                    attempt = request.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "Reconcile failed, retrying"
                );
                self.scheduler.schedule(request.retry(), delay);
            }
            None => {
                error!(
                    object = %request.key,
                    attempts = request.attempt,
                    error = %err,
                    "Reconcile failed, retries exhausted"
                );
                self.event_bus
                    .publish_operator_event(OperatorEvent::ReconcileAbandoned {
                        object: request.key.clone(),
                        attempts: request.attempt,
                        error: err.to_string(),
                        abandoned_at: Utc::now(),
                    });
            }
        }
    }
}

// ============================================================================
// Rollout controller
// ============================================================================

pub struct RolloutController {
    reconciler: Arc<AgentRolloutReconciler>,
    rollouts: Arc<dyn RolloutInspector>,
    requeuer: Requeuer,
}

impl RolloutController {
    pub fn new(
        reconciler: Arc<AgentRolloutReconciler>,
        rollouts: Arc<dyn RolloutInspector>,
        scheduler: Arc<dyn ReconcileScheduler>,
        retry: RetryPolicy,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            reconciler,
            rollouts,
            requeuer: Requeuer {
                scheduler,
                retry,
                event_bus,
            },
        }
    }

    /// Reconcile the current state of the rollout named by `request`
    pub async fn process(&self, request: ReconcileRequest) {
        let rollout = match self.rollouts.find(&request.key).await {
            Ok(Some(rollout)) => rollout,
            Ok(None) => {
                debug!(rollout = %request.key, "Rollout no longer exists, skipping");
                return;
            }
            Err(source) => {
                let err = ReconcileError::Repository {
                    object: request.key.clone(),
                    source,
                };
                self.requeuer.on_error(&request, &err);
                return;
            }
        };

        if !rollout.is_agent_rollout() {
            debug!(rollout = %request.key, "Rollout is not labelled as an agent, skipping");
            return;
        }

        match self.reconciler.reconcile(&rollout).await {
            Ok(action) => self.requeuer.on_action(&request, action),
            Err(err) => self.requeuer.on_error(&request, &err),
        }
    }

    /// Remove the agent of a deleted rollout; failures are logged, not retried
    pub async fn process_deleted(&self, rollout: &Rollout) {
        self.requeuer.scheduler.cancel(&rollout.key());
        if !rollout.is_agent_rollout() {
            return;
        }
        if let Err(err) = self.reconciler.cleanup(rollout).await {
            error!(rollout = %rollout.key(), error = %err, "Agent cleanup failed");
        }
    }

    /// Re-reconcile every stored agent rollout, then delete agents whose
    /// owning rollout is gone. Run after events were missed.
    pub async fn resync(&self) {
        let rollouts = match self.rollouts.list_all().await {
            Ok(rollouts) => rollouts,
            Err(err) => {
                error!(error = %err, "Failed to list rollouts for resync");
                return;
            }
        };

        let live: HashSet<ObjectKey> = rollouts.iter().map(Rollout::key).collect();
        for rollout in rollouts.iter().filter(|r| r.is_agent_rollout()) {
            self.process(ReconcileRequest::new(rollout.key())).await;
        }

        match self.reconciler.remove_orphans(&live).await {
            Ok(removed) => {
                info!(
                    rollouts = live.len(),
                    orphans_removed = removed.len(),
                    "Rollout resync complete"
                );
            }
            Err(err) => error!(error = %err, "Orphaned agent cleanup failed"),
        }
    }

    async fn handle_event(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::RolloutApplied { key } => self.process(ReconcileRequest::new(key)).await,
            ClusterEvent::RolloutDeleted { rollout } => self.process_deleted(&rollout).await,
            _ => {}
        }
    }

    /// Run until the event bus closes
    pub async fn run(
        self,
        mut events: ClusterEventReceiver,
        mut queue: mpsc::UnboundedReceiver<ReconcileRequest>,
    ) {
        info!("Rollout controller started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(EventBusError::Lagged(skipped)) => {
                        warn!(skipped, "Rollout controller missed events, resyncing");
                        self.resync().await
                    }
                    Err(EventBusError::Empty) => continue,
                    Err(EventBusError::Closed) => break,
                },
                Some(request) = queue.recv() => self.process(request).await,
            }
        }
        info!("Rollout controller stopped");
    }
}

// ============================================================================
// Channel controller
// ============================================================================

pub struct ChannelController {
    reconciler: Arc<ChannelReconciler>,
    namespaces: Vec<String>,
    resync_interval: Duration,
    requeuer: Requeuer,
}

impl ChannelController {
    pub fn new(
        reconciler: Arc<ChannelReconciler>,
        namespaces: Vec<String>,
        resync_interval: Duration,
        scheduler: Arc<dyn ReconcileScheduler>,
        retry: RetryPolicy,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            reconciler,
            namespaces,
            resync_interval,
            requeuer: Requeuer {
                scheduler,
                retry,
                event_bus,
            },
        }
    }

    pub async fn process(&self, request: ReconcileRequest) {
        if let Err(err) = self.reconciler.reconcile_key(&request.key).await {
            self.requeuer.on_error(&request, &err);
        }
    }

    /// Re-evaluate every channel of every watched namespace
    pub async fn resync(&self) {
        for namespace in &self.namespaces {
            self.reconcile_namespace(namespace).await;
        }
    }

    async fn reconcile_namespace(&self, namespace: &str) {
        match self.reconciler.reconcile_namespace(namespace).await {
            Ok(outcomes) => {
                debug!(namespace, channels = outcomes.len(), "Namespace channels re-evaluated");
            }
            Err(err) => {
                error!(namespace, error = %err, "Failed to list channels for re-evaluation");
            }
        }
    }

    async fn handle_event(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::ChannelApplied { key } => self.process(ReconcileRequest::new(key)).await,
            ClusterEvent::ChannelDeleted { key } => {
                if let Err(err) = self.reconciler.forget(&key).await {
                    error!(channel = %key, error = %err, "Failed to remove routing of deleted channel");
                }
            }
            // The provider pool changed; every channel of the namespace may flip
            ClusterEvent::AgentApplied { key } | ClusterEvent::AgentDeleted { key } => {
                self.reconcile_namespace(&key.namespace).await
            }
            ClusterEvent::RolloutApplied { .. } | ClusterEvent::RolloutDeleted { .. } => {}
        }
    }

    /// Run until the event bus closes
    pub async fn run(
        self,
        mut events: ClusterEventReceiver,
        mut queue: mpsc::UnboundedReceiver<ReconcileRequest>,
    ) {
        info!(
            namespaces = ?self.namespaces,
            resync_secs = self.resync_interval.as_secs(),
            "Channel controller started"
        );
        let mut resync = tokio::time::interval(self.resync_interval);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(EventBusError::Lagged(_)) => {
                        // Missed events; catch up with a full pass
                        self.resync().await
                    }
                    Err(EventBusError::Empty) => continue,
                    Err(EventBusError::Closed) => break,
                },
                Some(request) = queue.recv() => self.process(request).await,
                _ = resync.tick() => self.resync().await,
            }
        }
        info!("Channel controller stopped");
    }
}
