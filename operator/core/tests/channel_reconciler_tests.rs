// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Channel evaluation against the in-process cluster: status transitions,
//! routing publication and alerting.

use async_trait::async_trait;
use capwire_core::application::alert::{AlertDeliveryError, AlertNotifier, AlertPayload, AlertSink};
use capwire_core::application::channel_reconciler::{ChannelOutcome, ChannelReconciler};
use capwire_core::application::controller::{ChannelController, RetryPolicy, TokioScheduler};
use capwire_core::domain::agent::{AgentResource, AgentSpec};
use capwire_core::domain::capability::{ProvidedCapability, RequiredCapability};
use capwire_core::domain::channel::{ChannelResource, ResolveStatus};
use capwire_core::domain::events::OperatorEvent;
use capwire_core::domain::repository::{AgentRepository, ChannelRepository};
use capwire_core::domain::resolver::Resolver;
use capwire_core::domain::resource::{ObjectKey, ObjectMeta};
use capwire_core::domain::scope::{CHANNEL_LABEL_KEY, TENANT_LABEL_KEY};
use capwire_core::infrastructure::event_bus::EventBus;
use capwire_core::infrastructure::local_cluster::LocalCluster;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<AlertPayload>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn endpoint(&self) -> &str {
        "memory://alerts"
    }

    async fn deliver(&self, payload: &AlertPayload) -> Result<u16, AlertDeliveryError> {
        self.delivered.lock().push(payload.clone());
        Ok(202)
    }
}

fn ordering_agent(version: &str) -> AgentResource {
    AgentResource::new(
        ObjectMeta::new("shop", "ordering"),
        AgentSpec {
            id: "ordering-agent".to_string(),
            description: "Takes orders".to_string(),
            supported_tenants: BTreeSet::new(),
            supported_channels: BTreeSet::from(["web".to_string()]),
            provided_capabilities: vec![ProvidedCapability {
                id: "ordering".to_string(),
                name: "Ordering".to_string(),
                version: version.to_string(),
                description: String::new(),
                examples: vec![],
            }],
        },
    )
}

fn channel(required: Vec<RequiredCapability>) -> ChannelResource {
    ChannelResource::new(
        ObjectMeta::new("shop", "acme-web")
            .with_label(TENANT_LABEL_KEY, "acme")
            .with_label(CHANNEL_LABEL_KEY, "web"),
        required,
    )
}

struct Harness {
    cluster: Arc<LocalCluster>,
    sink: Arc<RecordingSink>,
    bus: Arc<EventBus>,
    reconciler: Arc<ChannelReconciler>,
}

fn harness() -> Harness {
    let bus = Arc::new(EventBus::new(128));
    let cluster = Arc::new(LocalCluster::new(bus.clone()));
    let sink = Arc::new(RecordingSink::default());
    let reconciler = Arc::new(ChannelReconciler::new(
        cluster.clone(),
        cluster.clone(),
        Resolver::new(),
        AlertNotifier::new(Some(sink.clone())),
        bus.clone(),
    ));
    Harness {
        cluster,
        sink,
        bus,
        reconciler,
    }
}

#[tokio::test]
async fn test_resolved_channel_publishes_routing_without_alert() {
    let h = harness();
    h.cluster.apply_agent(ordering_agent("1.0"));
    let acme = channel(vec![RequiredCapability::new("ordering", "1.0")]);
    h.cluster.apply_channel(acme.clone());

    let outcome = h.reconciler.reconcile(&acme).await.unwrap();

    assert_eq!(outcome, ChannelOutcome::Resolved { wires: 1 });
    let status = h.cluster.channel(&acme.key()).unwrap().status.unwrap();
    assert_eq!(status.resolve_status, ResolveStatus::Resolved);
    let routing = h.cluster.find_routing(&acme.key()).await.unwrap().unwrap();
    assert_eq!(routing.spec.capability_groups[0].id, "ordering-agent");
    assert_eq!(routing.spec.capability_groups[0].capabilities[0].provided_version, "1.0");
    assert!(h.sink.delivered.lock().is_empty());
}

#[tokio::test]
async fn test_unresolved_channel_sets_status_and_alerts_once() {
    let h = harness();
    let mut events = h.bus.subscribe();
    h.cluster.apply_agent(ordering_agent("1.0"));
    let acme = channel(vec![
        RequiredCapability::new("ordering", "1.0"),
        RequiredCapability::new("payments", "2.0"),
    ]);
    h.cluster.apply_channel(acme.clone());

    let outcome = h.reconciler.reconcile(&acme).await.unwrap();

    let expected_missing = BTreeSet::from([RequiredCapability::new("payments", "2.0")]);
    assert_eq!(
        outcome,
        ChannelOutcome::Unresolved {
            missing: expected_missing.clone()
        }
    );

    let status = h.cluster.channel(&acme.key()).unwrap().status.unwrap();
    assert_eq!(status.resolve_status, ResolveStatus::Unresolved);
    assert_eq!(status.unresolved_required_capabilities, expected_missing);
    assert!(h.cluster.find_routing(&acme.key()).await.unwrap().is_none());

    let delivered = h.sink.delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].channel, "acme-web");
    assert_eq!(delivered[0].unresolved_capabilities[0].id, "payments");
    assert!(delivered[0].reason.starts_with("Required capabilities not resolved"));
    drop(delivered);

    assert!(events
        .drain_operator_events()
        .iter()
        .any(|e| matches!(e, OperatorEvent::ChannelUnresolved { .. })));
}

#[tokio::test]
async fn test_unchanged_gap_is_not_realerted() {
    let h = harness();
    let acme = channel(vec![
        RequiredCapability::new("ordering", "1.0"),
        RequiredCapability::new("payments", "2.0"),
    ]);
    h.cluster.apply_channel(acme.clone());

    h.reconciler.reconcile_key(&acme.key()).await.unwrap();
    h.reconciler.reconcile_key(&acme.key()).await.unwrap();
    assert_eq!(h.sink.delivered.lock().len(), 1);

    // A provider arrives for one requirement; the gap narrows
    h.cluster.apply_agent(ordering_agent("1.0"));
    h.reconciler.reconcile_key(&acme.key()).await.unwrap();
    h.reconciler.reconcile_namespace("shop").await.unwrap();

    let delivered = h.sink.delivered.lock();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[1].unresolved_capabilities.len(), 1);
    assert_eq!(delivered[1].unresolved_capabilities[0].id, "payments");
}

#[tokio::test]
async fn test_empty_pool_marks_every_requirement_unresolved() {
    let h = harness();
    let acme = channel(vec![
        RequiredCapability::new("ordering", "1.0"),
        RequiredCapability::new("billing", "1.0"),
    ]);
    h.cluster.apply_channel(acme.clone());

    let outcome = h.reconciler.reconcile(&acme).await.unwrap();

    match outcome {
        ChannelOutcome::Unresolved { missing } => assert_eq!(missing.len(), 2),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let delivered = h.sink.delivered.lock();
    assert!(delivered[0].reason.starts_with("Resolve context is empty"));
}

#[tokio::test]
async fn test_losing_provider_withdraws_routing() {
    let h = harness();
    h.cluster.apply_agent(ordering_agent("1.0"));
    let acme = channel(vec![RequiredCapability::new("ordering", "1.0")]);
    h.cluster.apply_channel(acme.clone());
    h.reconciler.reconcile(&acme).await.unwrap();
    assert!(h.cluster.find_routing(&acme.key()).await.unwrap().is_some());

    AgentRepository::delete(h.cluster.as_ref(), &ObjectKey::new("shop", "ordering"))
        .await
        .unwrap();
    let outcomes = h.reconciler.reconcile_namespace("shop").await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, ChannelOutcome::Unresolved { .. }));
    assert!(h.cluster.find_routing(&acme.key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reconcile_key_skips_deleted_channel() {
    let h = harness();
    let outcome = h
        .reconciler
        .reconcile_key(&ObjectKey::new("shop", "gone"))
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_channel_controller_reacts_to_new_agent() {
    let h = harness();
    let acme = channel(vec![RequiredCapability::new("ordering", "1.0")]);
    h.cluster.apply_channel(acme.clone());

    let (scheduler, queue) = TokioScheduler::channel();
    let controller = ChannelController::new(
        h.reconciler.clone(),
        vec!["shop".to_string()],
        Duration::from_secs(3600),
        Arc::new(scheduler),
        RetryPolicy::default(),
        h.bus.clone(),
    );
    let events = h.bus.subscribe_cluster();
    let mut observer = h.bus.subscribe();
    let task = tokio::spawn(controller.run(events, queue));

    // Initial resync evaluates the channel without providers.
    wait_for(&mut observer, |e| matches!(e, OperatorEvent::ChannelUnresolved { .. })).await;

    h.cluster.apply_agent(ordering_agent("1.4.0"));
    wait_for(&mut observer, |e| matches!(e, OperatorEvent::ChannelResolved { .. })).await;

    let routing = h.cluster.find_routing(&acme.key()).await.unwrap().unwrap();
    assert_eq!(routing.spec.capability_groups[0].capabilities[0].provided_version, "1.4.0");
    assert_eq!(
        ChannelRepository::list(h.cluster.as_ref(), "shop").await.unwrap().len(),
        1
    );
    task.abort();
}

async fn wait_for(
    receiver: &mut capwire_core::infrastructure::event_bus::EventReceiver,
    predicate: impl Fn(&OperatorEvent) -> bool,
) {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(capwire_core::infrastructure::event_bus::DomainEvent::Operator(event)) =
                receiver.recv().await
            {
                if predicate(&event) {
                    return;
                }
            }
        }
    });
    deadline.await.expect("expected operator event was not published");
}
