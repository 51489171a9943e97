// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::capability::RequiredCapability;
use crate::domain::resource::ObjectKey;
use crate::domain::rollout::Rollout;

/// Changes observed on watched cluster objects.
///
/// These are the triggers of reconciliation; a deleted rollout carries its
/// last known state so cleanup does not depend on reading it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterEvent {
    RolloutApplied { key: ObjectKey },
    RolloutDeleted { rollout: Box<Rollout> },
    ChannelApplied { key: ObjectKey },
    ChannelDeleted { key: ObjectKey },
    AgentApplied { key: ObjectKey },
    AgentDeleted { key: ObjectKey },
}

impl ClusterEvent {
    pub fn namespace(&self) -> &str {
        match self {
            ClusterEvent::RolloutApplied { key }
            | ClusterEvent::ChannelApplied { key }
            | ClusterEvent::ChannelDeleted { key }
            | ClusterEvent::AgentApplied { key }
            | ClusterEvent::AgentDeleted { key } => &key.namespace,
            ClusterEvent::RolloutDeleted { rollout } => &rollout.metadata.namespace,
        }
    }
}

/// Outcomes of reconciliation, published for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorEvent {
    AgentMaterialized {
        rollout: ObjectKey,
        agent_id: String,
        capability_count: usize,
        materialized_at: DateTime<Utc>,
    },
    AgentRemoved {
        rollout: ObjectKey,
        removed_at: DateTime<Utc>,
    },
    RolloutRequeued {
        rollout: ObjectKey,
        delay_secs: u64,
        requeued_at: DateTime<Utc>,
    },
    ReconcileFailed {
        object: ObjectKey,
        attempt: u32,
        error: String,
        failed_at: DateTime<Utc>,
    },
    /// Retry budget exhausted; the error is surfaced and no further automatic action is taken.
    ReconcileAbandoned {
        object: ObjectKey,
        attempts: u32,
        error: String,
        abandoned_at: DateTime<Utc>,
    },
    ChannelResolved {
        channel: ObjectKey,
        wire_count: usize,
        resolved_at: DateTime<Utc>,
    },
    ChannelUnresolved {
        channel: ObjectKey,
        unresolved: Vec<RequiredCapability>,
        reason: String,
        evaluated_at: DateTime<Utc>,
    },
}
