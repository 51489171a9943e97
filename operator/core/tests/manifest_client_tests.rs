// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent manifest fetching over HTTP.

use capwire_core::domain::repository::{ManifestClient, ManifestError};
use capwire_core::infrastructure::manifest_client::HttpManifestClient;
use std::time::Duration;
use url::Url;

const MANIFEST: &str = r#"{
  "id": "ordering-agent",
  "description": "Takes orders",
  "supportedTenants": ["acme"],
  "supportedChannels": ["web", "app"],
  "capabilities": [
    {
      "id": "ordering",
      "name": "Ordering",
      "version": "1.2.0",
      "description": "Place and track orders",
      "examples": ["I want to order a pizza"]
    }
  ]
}"#;

fn manifest_url(server: &mockito::ServerGuard) -> Url {
    Url::parse(&format!("{}/.well-known/capabilities.json", server.url())).unwrap()
}

#[tokio::test]
async fn test_fetch_parses_manifest() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/.well-known/capabilities.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MANIFEST)
        .create_async()
        .await;

    let client = HttpManifestClient::new(Duration::from_secs(5)).unwrap();
    let manifest = client.fetch(&manifest_url(&server)).await.unwrap();

    assert_eq!(manifest.id, "ordering-agent");
    assert!(manifest.supported_tenants.contains("acme"));
    assert_eq!(manifest.capabilities.len(), 1);
    assert_eq!(manifest.capabilities[0].examples.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_reports_http_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/.well-known/capabilities.json")
        .with_status(404)
        .create_async()
        .await;

    let client = HttpManifestClient::new(Duration::from_secs(5)).unwrap();
    let err = client.fetch(&manifest_url(&server)).await.unwrap_err();

    assert!(matches!(err, ManifestError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_fetch_rejects_malformed_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/.well-known/capabilities.json")
        .with_status(200)
        .with_body("{\"description\": \"no id\"")
        .create_async()
        .await;

    let client = HttpManifestClient::new(Duration::from_secs(5)).unwrap();
    let err = client.fetch(&manifest_url(&server)).await.unwrap_err();

    assert!(matches!(err, ManifestError::Decode { .. }));
}
