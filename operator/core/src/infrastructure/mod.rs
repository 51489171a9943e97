// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod local_cluster;
pub mod manifest_client;
pub mod webhook;

pub use event_bus::{DomainEvent, EventBus};
pub use local_cluster::LocalCluster;
pub use manifest_client::HttpManifestClient;
pub use webhook::WebhookAlertSink;
