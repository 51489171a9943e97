// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Unresolved-channel alerting.
//!
//! The log line is the guaranteed channel; a configured [`AlertSink`] gets one
//! best-effort delivery attempt whose failure is logged and dropped.

use crate::domain::capability::RequiredCapability;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// JSON body posted to the alert webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub namespace: String,
    pub channel: String,
    pub unresolved_capabilities: Vec<UnresolvedCapabilityRef>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCapabilityRef {
    pub id: String,
    pub name: String,
    pub version: String,
}

impl From<&RequiredCapability> for UnresolvedCapabilityRef {
    fn from(required: &RequiredCapability) -> Self {
        Self {
            id: required.id.clone(),
            name: required.name.clone(),
            version: required.version.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertDeliveryError {
    #[error("alert endpoint rejected delivery (status={status})")]
    Rejected { status: u16 },

    #[error("alert transport failed: {0}")]
    Transport(String),

    #[error("alert payload could not be encoded: {0}")]
    Serialization(String),
}

/// Outbound alert transport.
///
/// `deliver` returns the HTTP status on a 2xx answer and an error otherwise.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Where alerts go, for log lines
    fn endpoint(&self) -> &str;

    async fn deliver(&self, payload: &AlertPayload) -> Result<u16, AlertDeliveryError>;
}

#[derive(Clone, Default)]
pub struct AlertNotifier {
    sink: Option<Arc<dyn AlertSink>>,
}

impl AlertNotifier {
    pub fn new(sink: Option<Arc<dyn AlertSink>>) -> Self {
        Self { sink }
    }

    /// Notifier that only logs
    pub fn log_only() -> Self {
        Self { sink: None }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn notify<'r>(
        &self,
        namespace: &str,
        channel: &str,
        unresolved: impl IntoIterator<Item = &'r RequiredCapability>,
        reason: &str,
    ) {
        let payload = AlertPayload::new(namespace, channel, unresolved, reason);
        log_alert(&payload);

        let Some(sink) = &self.sink else {
            debug!("No alert webhook configured. Skipping webhook delivery.");
            return;
        };

        match sink.deliver(&payload).await {
            Ok(status) => {
                info!(endpoint = sink.endpoint(), status, "Alert delivered to webhook");
            }
            Err(e) => {
                error!(endpoint = sink.endpoint(), error = %e, "Failed to deliver alert to webhook");
            }
        }
    }

    /// Log an alert that was already delivered for the same unresolved set.
    /// The webhook is not called again.
    pub fn notify_unchanged<'r>(
        &self,
        namespace: &str,
        channel: &str,
        unresolved: impl IntoIterator<Item = &'r RequiredCapability>,
        reason: &str,
    ) {
        log_alert(&AlertPayload::new(namespace, channel, unresolved, reason));
        if self.sink.is_some() {
            debug!(channel, "Unresolved set unchanged since last alert. Skipping webhook delivery.");
        }
    }
}

impl AlertPayload {
    fn new<'r>(
        namespace: &str,
        channel: &str,
        unresolved: impl IntoIterator<Item = &'r RequiredCapability>,
        reason: &str,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            channel: channel.to_string(),
            unresolved_capabilities: unresolved.into_iter().map(Into::into).collect(),
            reason: reason.to_string(),
        }
    }
}

fn log_alert(payload: &AlertPayload) {
    warn!(
        namespace = %payload.namespace,
        channel = %payload.channel,
        unresolved = %format_unresolved(&payload.unresolved_capabilities),
        reason = %payload.reason,
        "ALERT: Channel unresolved"
    );
}

fn format_unresolved(unresolved: &[UnresolvedCapabilityRef]) -> String {
    let entries: Vec<String> = unresolved
        .iter()
        .map(|c| format!("{}(name={}, version={})", c.id, c.name, c.version))
        .collect();
    format!("[{}]", entries.join(", "))
}
