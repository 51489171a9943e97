// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod alert;
pub mod channel_reconciler;
pub mod controller;
pub mod rollout_reconciler;

pub use alert::{AlertNotifier, AlertSink};
pub use channel_reconciler::{ChannelOutcome, ChannelReconciler};
pub use controller::{Action, ReconcileError, RetryPolicy};
pub use rollout_reconciler::AgentRolloutReconciler;
