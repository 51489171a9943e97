// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::channel::{ChannelResource, ChannelRouting};
use crate::domain::operator_config::RoutingConfig;
use crate::domain::repository::{ChannelRepository, RepositoryError};
use crate::domain::scope::{CHANNEL_LABEL_KEY, DEFAULT_SUBSET, TENANT_LABEL_KEY};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const X_SUBSET_HEADER: &str = "x-subset";
pub const X_NAMESPACE_HEADER: &str = "x-namespace";

pub struct ApiState {
    pub channels: Arc<dyn ChannelRepository>,
    pub canary_release_enabled: bool,
    pub default_namespace: String,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(channels: Arc<dyn ChannelRepository>, routing: &RoutingConfig) -> Self {
        Self {
            channels,
            canary_release_enabled: routing.canary_release_enabled,
            default_namespace: routing.default_namespace.clone(),
            started_at: Instant::now(),
        }
    }

    /// Subset a query is scoped to. With canary releases on, callers must say
    /// which subset they are routed to.
    fn subset(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        match header(headers, X_SUBSET_HEADER) {
            Some(subset) => Ok(subset),
            None if self.canary_release_enabled => Err(ApiError::SubsetRequired),
            None => Ok(DEFAULT_SUBSET.to_string()),
        }
    }

    fn namespace(&self, headers: &HeaderMap) -> String {
        header(headers, X_NAMESPACE_HEADER).unwrap_or_else(|| self.default_namespace.clone())
    }
}

pub fn app(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/apis/v1/tenants/{tenant}/channels", get(list_channels_handler))
        .route("/apis/v1/tenants/{tenant}/channels/{channel}", get(get_channel_handler))
        .route(
            "/apis/v1/tenants/{tenant}/channels/{channel}/routing",
            get(get_routing_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    SubsetRequired,
    NotFound,
    Repository(RepositoryError),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Repository(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SubsetRequired => (
                StatusCode::BAD_REQUEST,
                "Subset value is required when canary release is enabled".to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Repository(err) => {
                error!(error = %err, "Channel query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn in_scope(channel: &ChannelResource, tenant: &str, subset: &str) -> bool {
    channel.metadata.label(TENANT_LABEL_KEY) == Some(tenant)
        && channel.scope().effective_subset() == subset
}

async fn find_channel(
    state: &ApiState,
    headers: &HeaderMap,
    tenant: &str,
    channel: &str,
) -> Result<ChannelResource, ApiError> {
    let subset = state.subset(headers)?;
    let namespace = state.namespace(headers);
    state
        .channels
        .list(&namespace)
        .await?
        .into_iter()
        .find(|c| in_scope(c, tenant, &subset) && c.metadata.label(CHANNEL_LABEL_KEY) == Some(channel))
        .ok_or(ApiError::NotFound)
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn list_channels_handler(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChannelResource>>, ApiError> {
    let subset = state.subset(&headers)?;
    let namespace = state.namespace(&headers);
    let channels = state
        .channels
        .list(&namespace)
        .await?
        .into_iter()
        .filter(|c| in_scope(c, &tenant, &subset))
        .collect();
    Ok(Json(channels))
}

async fn get_channel_handler(
    State(state): State<Arc<ApiState>>,
    Path((tenant, channel)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ChannelResource>, ApiError> {
    let channel = find_channel(&state, &headers, &tenant, &channel).await?;
    Ok(Json(channel))
}

async fn get_routing_handler(
    State(state): State<Arc<ApiState>>,
    Path((tenant, channel)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ChannelRouting>, ApiError> {
    let channel = find_channel(&state, &headers, &tenant, &channel).await?;
    let routing = state
        .channels
        .find_routing(&channel.key())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(routing))
}
