// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Behavioural tests for the capability resolution engine.
//!
//! Covers determinism, all-or-nothing failure, completeness of the missing
//! set, version selection and the scope rules as seen through `resolve`.

use capwire_core::domain::agent::{AgentResource, AgentSpec};
use capwire_core::domain::capability::{ProvidedCapability, RequiredCapability, StrategyTag};
use capwire_core::domain::resolver::{Resolver, ResolverError};
use capwire_core::domain::resource::ObjectMeta;
use capwire_core::domain::scope::{ChannelScope, SUBSET_LABEL_KEY};
use std::collections::BTreeSet;

fn capability(id: &str, version: &str) -> ProvidedCapability {
    ProvidedCapability {
        id: id.to_string(),
        name: id.to_string(),
        version: version.to_string(),
        description: format!("{id} capability"),
        examples: vec![],
    }
}

fn agent(name: &str, tenants: &[&str], capabilities: Vec<ProvidedCapability>) -> AgentResource {
    AgentResource::new(
        ObjectMeta::new("shop", name),
        AgentSpec {
            id: format!("{name}-id"),
            description: String::new(),
            supported_tenants: tenants.iter().map(|t| t.to_string()).collect(),
            supported_channels: BTreeSet::from(["web".to_string()]),
            provided_capabilities: capabilities,
        },
    )
}

fn web_scope(tenant: &str) -> ChannelScope {
    ChannelScope::new(None::<String>, tenant, "web")
}

#[test]
fn test_clean_resolve_binds_single_wire() {
    let pool = vec![agent("ordering-agent", &[], vec![capability("ordering", "1.0")])];
    let required = [RequiredCapability::new("ordering", "1.0")];

    let wires = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap();

    assert_eq!(wires.len(), 1);
    let wire = wires.for_requirement("ordering").unwrap();
    assert_eq!(wire.agent.name(), "ordering-agent");
    assert_eq!(wire.provided.version, "1.0");
}

#[test]
fn test_version_selection_prefers_greatest_satisfying() {
    let pool = vec![
        agent("v1", &[], vec![capability("ordering", "1.0.0")]),
        agent("v2", &[], vec![capability("ordering", "2.0.0")]),
        agent("v12", &[], vec![capability("ordering", "1.2.0")]),
    ];
    let required = [RequiredCapability::new("ordering", "^1.0")];

    let wires = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap();

    assert_eq!(wires.for_requirement("ordering").unwrap().provided.version, "1.2.0");
}

#[test]
fn test_exact_strategy_selects_requested_version_only() {
    let pool = vec![
        agent("v12", &[], vec![capability("ordering", "1.2.0")]),
        agent("v1", &[], vec![capability("ordering", "1.0")]),
    ];
    let required = [RequiredCapability::new("ordering", "1.0.0").with_strategy(StrategyTag::Exact)];

    let wires = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap();

    assert_eq!(wires.for_requirement("ordering").unwrap().agent.name(), "v1");
}

#[test]
fn test_resolution_is_deterministic_and_order_independent() {
    let pool = vec![
        agent("a", &[], vec![capability("ordering", "1.1.0"), capability("billing", "2.0.0")]),
        agent("b", &[], vec![capability("ordering", "1.1.0"), capability("returns", "1.0.0")]),
    ];
    let forward = vec![
        RequiredCapability::new("ordering", "1"),
        RequiredCapability::new("billing", "2"),
        RequiredCapability::new("returns", "1"),
    ];
    let backward: Vec<_> = forward.iter().rev().cloned().collect();

    let resolver = Resolver::new();
    let first = resolver.resolve(&forward, &pool, &web_scope("acme")).unwrap();
    let second = resolver.resolve(&backward, &pool, &web_scope("acme")).unwrap();

    assert_eq!(first, second);
    // Equal versions: first agent in pool order wins.
    assert_eq!(first.for_requirement("ordering").unwrap().agent.name(), "a");
}

#[test]
fn test_one_unresolved_requirement_fails_whole_call() {
    let pool = vec![agent("ordering-agent", &[], vec![capability("ordering", "1.0.0")])];
    let required = [
        RequiredCapability::new("ordering", "1.0"),
        RequiredCapability::new("payments", "2.0"),
    ];

    let err = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap_err();

    match err {
        ResolverError::UnresolvedCapabilities { missing } => {
            assert_eq!(missing, BTreeSet::from([RequiredCapability::new("payments", "2.0")]));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_set_reports_every_failure_kind() {
    let pool = vec![
        agent("ordering-agent", &[], vec![capability("ordering", "1.0.0")]),
        agent("billing-agent", &[], vec![capability("billing", "1.0.0")]),
        agent("other-tenant", &["globex"], vec![capability("returns", "1.0.0")]),
    ];
    let required = [
        // satisfied
        RequiredCapability::new("ordering", "1.0"),
        // candidate exists, version does not satisfy
        RequiredCapability::new("billing", "2.0"),
        // only provider is out of tenant scope
        RequiredCapability::new("returns", "1.0"),
        // nobody provides it
        RequiredCapability::new("payments", "1.0"),
    ];

    let err = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap_err();

    let missing: Vec<&str> = err.unresolved().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(missing, vec!["billing", "payments", "returns"]);
    assert!(err.to_string().starts_with("Required capabilities not resolved"));
}

#[test]
fn test_empty_pool_reports_all_requirements() {
    let required = [
        RequiredCapability::new("ordering", "1.0"),
        RequiredCapability::new("billing", "1.0"),
    ];

    let err = Resolver::new()
        .resolve(&required, &[], &web_scope("acme"))
        .unwrap_err();

    assert!(matches!(err, ResolverError::EmptyProviderPool { .. }));
    assert_eq!(err.unresolved().len(), 2);
    assert!(err.to_string().starts_with("Resolve context is empty"));
}

#[test]
fn test_pool_entirely_out_of_scope_is_unresolved_not_empty() {
    let pool = vec![agent("globex-only", &["globex"], vec![capability("ordering", "1.0.0")])];
    let required = [RequiredCapability::new("ordering", "1.0")];

    let err = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap_err();

    assert!(matches!(err, ResolverError::UnresolvedCapabilities { .. }));
}

#[test]
fn test_canary_channel_only_sees_canary_agents() {
    let mut canary = agent("ordering-canary", &[], vec![capability("ordering", "1.3.0")]);
    canary.metadata = canary.metadata.with_label(SUBSET_LABEL_KEY, "canary");
    let stable = agent("ordering-stable", &[], vec![capability("ordering", "1.1.0")]);
    let pool = vec![canary, stable];
    let required = [RequiredCapability::new("ordering", "1.0")];

    let stable_wires = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap();
    let canary_wires = Resolver::new()
        .resolve(&required, &pool, &ChannelScope::new(Some("canary"), "acme", "web"))
        .unwrap();

    assert_eq!(stable_wires.for_requirement("ordering").unwrap().agent.name(), "ordering-stable");
    assert_eq!(canary_wires.for_requirement("ordering").unwrap().agent.name(), "ordering-canary");
}

#[test]
fn test_no_requirements_resolve_to_empty_wire_set() {
    let pool = vec![agent("ordering-agent", &[], vec![capability("ordering", "1.0.0")])];
    let required: Vec<RequiredCapability> = Vec::new();
    let wires = Resolver::new()
        .resolve(&required, &pool, &web_scope("acme"))
        .unwrap();
    assert!(wires.is_empty());
}
