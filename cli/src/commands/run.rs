// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operator process
//!
//! Wires the in-process cluster, both controllers and the routing API, then
//! serves until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

use capwire_core::application::alert::{AlertNotifier, AlertSink};
use capwire_core::application::channel_reconciler::ChannelReconciler;
use capwire_core::application::controller::{
    ChannelController, RetryPolicy, RolloutController, TokioScheduler,
};
use capwire_core::application::rollout_reconciler::AgentRolloutReconciler;
use capwire_core::domain::events::OperatorEvent;
use capwire_core::domain::operator_config::OperatorConfigManifest;
use capwire_core::domain::resolver::Resolver;
use capwire_core::infrastructure::event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver};
use capwire_core::infrastructure::local_cluster::LocalCluster;
use capwire_core::infrastructure::manifest_client::HttpManifestClient;
use capwire_core::infrastructure::webhook::WebhookAlertSink;
use capwire_core::presentation::api::{app, ApiState};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// HTTP API host
    #[arg(long, env = "CAPWIRE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP API port
    #[arg(long, env = "CAPWIRE_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory of Rollout, Agent and Channel manifests applied at startup
    #[arg(long, env = "CAPWIRE_MANIFESTS_DIR", value_name = "DIR")]
    pub manifests: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = OperatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    info!(
        name = %config.metadata.name,
        rollout_enabled = config.spec.rollout.enabled,
        canary_release_enabled = config.spec.routing.canary_release_enabled,
        "Starting capwire operator"
    );

    let event_bus = Arc::new(EventBus::with_default_capacity());
    let cluster = Arc::new(LocalCluster::new(event_bus.clone()));
    let retry = RetryPolicy::from_config(&config.spec.retry);

    tokio::spawn(log_operator_events(event_bus.subscribe()));

    // Channel resolution
    let notifier = match &config.spec.alert.webhook_url {
        Some(url) => {
            let sink = WebhookAlertSink::new(url.clone(), config.spec.alert.timeout())
                .context("Failed to build alert webhook client")?;
            info!(endpoint = sink.endpoint(), "Alert webhook configured");
            AlertNotifier::new(Some(Arc::new(sink)))
        }
        None => AlertNotifier::log_only(),
    };
    let channel_reconciler = Arc::new(ChannelReconciler::new(
        cluster.clone(),
        cluster.clone(),
        Resolver::new(),
        notifier,
        event_bus.clone(),
    ));
    let (channel_scheduler, channel_queue) = TokioScheduler::channel();
    let channel_controller = ChannelController::new(
        channel_reconciler,
        config.spec.channels.namespaces.clone(),
        config.spec.channels.resync_interval(),
        Arc::new(channel_scheduler),
        retry.clone(),
        event_bus.clone(),
    );
    let channel_events = event_bus.subscribe_cluster();

    // Rollout to agent materialization
    let rollout_controller = if config.spec.rollout.enabled {
        let manifests = HttpManifestClient::new(config.spec.rollout.manifest_timeout())
            .context("Failed to build manifest HTTP client")?;
        let reconciler = Arc::new(AgentRolloutReconciler::with_config(
            cluster.clone(),
            cluster.clone(),
            Arc::new(manifests),
            event_bus.clone(),
            &config.spec.rollout,
        ));
        let (scheduler, queue) = TokioScheduler::channel();
        let controller = RolloutController::new(
            reconciler,
            cluster.clone(),
            Arc::new(scheduler),
            retry,
            event_bus.clone(),
        );
        Some((controller, event_bus.subscribe_cluster(), queue))
    } else {
        info!("Rollout reconciliation disabled");
        None
    };

    // Controllers are subscribed; anything applied from here on is observed
    if let Some(dir) = &args.manifests {
        cluster
            .load_dir(dir)
            .with_context(|| format!("Failed to load manifests from {:?}", dir))?;
    }

    let channel_task = tokio::spawn(channel_controller.run(channel_events, channel_queue));
    let rollout_task = rollout_controller
        .map(|(controller, events, queue)| tokio::spawn(controller.run(events, queue)));

    let state = Arc::new(ApiState::new(cluster.clone(), &config.spec.routing));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Routing API listening on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Operator shutting down");

    channel_task.abort();
    if let Some(task) = rollout_task {
        task.abort();
    }

    Ok(())
}

async fn log_operator_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(DomainEvent::Operator(event)) => log_operator_event(&event),
            Ok(DomainEvent::Cluster(event)) => {
                debug!(namespace = event.namespace(), event = ?event, "Cluster event");
            }
            Err(EventBusError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagging behind the bus");
            }
            Err(EventBusError::Empty) => continue,
            Err(EventBusError::Closed) => break,
        }
    }
}

fn log_operator_event(event: &OperatorEvent) {
    match event {
        OperatorEvent::ReconcileAbandoned { object, attempts, error, .. } => {
            error!(object = %object, attempts, error = %error, "Reconcile abandoned");
        }
        other => match serde_json::to_string(other) {
            Ok(json) => debug!(event = %json, "Operator event"),
            Err(e) => debug!(error = %e, "Operator event could not be encoded"),
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
