// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Cluster events
// drive the controllers; operator events are published for observers
// (the CLI `run` command logs them, tests assert on them).

use crate::domain::events::{ClusterEvent, OperatorEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Cluster(ClusterEvent),
    Operator(OperatorEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_cluster_event(&self, event: ClusterEvent) {
        self.publish(DomainEvent::Cluster(event));
    }

    pub fn publish_operator_event(&self, event: OperatorEvent) {
        self.publish(DomainEvent::Operator(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to cluster events only; the controllers' trigger stream
    pub fn subscribe_cluster(&self) -> ClusterEventReceiver {
        ClusterEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain every operator event currently buffered
    pub fn drain_operator_events(&mut self) -> Vec<OperatorEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(DomainEvent::Operator(event)) => events.push(event),
                Ok(DomainEvent::Cluster(_)) | Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Receiver filtered to cluster events
pub struct ClusterEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl ClusterEventReceiver {
    pub async fn recv(&mut self) -> Result<ClusterEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Cluster(cluster_event) = event {
                return Ok(cluster_event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::ObjectKey;
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish_operator_event(OperatorEvent::AgentRemoved {
            rollout: ObjectKey::new("shop", "ordering"),
            removed_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Operator(OperatorEvent::AgentRemoved { rollout, .. }) => {
                assert_eq!(rollout.name, "ordering");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cluster_receiver_skips_operator_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_cluster();

        event_bus.publish_operator_event(OperatorEvent::AgentRemoved {
            rollout: ObjectKey::new("shop", "ordering"),
            removed_at: Utc::now(),
        });
        event_bus.publish_cluster_event(ClusterEvent::ChannelApplied {
            key: ObjectKey::new("shop", "acme-web"),
        });

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, ClusterEvent::ChannelApplied { .. }));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::default();
        event_bus.publish_cluster_event(ClusterEvent::AgentDeleted {
            key: ObjectKey::new("shop", "ordering"),
        });
        assert_eq!(event_bus.subscriber_count(), 0);
    }
}
