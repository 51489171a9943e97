// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Webhook alert sink: one JSON POST per alert, bounded by a timeout, no retry.

use crate::application::alert::{AlertDeliveryError, AlertPayload, AlertSink};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub struct WebhookAlertSink {
    url: String,
    client: Client,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn deliver(&self, payload: &AlertPayload) -> Result<u16, AlertDeliveryError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| AlertDeliveryError::Serialization(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| AlertDeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(AlertDeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
