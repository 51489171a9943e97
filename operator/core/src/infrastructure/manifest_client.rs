// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Manifest Client
//!
//! Fetches the capability manifest a ready agent serves about itself.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** HTTP implementation of `ManifestClient`
//! - **Integration:** Agent service `/.well-known/capabilities.json` → `AgentSpecification`

use crate::domain::agent::AgentSpecification;
use crate::domain::repository::{ManifestClient, ManifestError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct HttpManifestClient {
    client: Client,
}

impl HttpManifestClient {
    /// Client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("capwire/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ManifestClient for HttpManifestClient {
    async fn fetch(&self, url: &Url) -> Result<AgentSpecification, ManifestError> {
        debug!(url = %url, "Fetching agent manifest");

        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ManifestError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManifestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| ManifestError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| ManifestError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
