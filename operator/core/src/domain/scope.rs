// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scope Filter
//!
//! Decides whether an agent may serve a channel, from labels alone:
//!
//! 1. deployment subset equal (absent = `stable` on either side);
//! 2. agent's supported tenants empty, or containing the channel's tenant;
//! 3. agent's supported channels containing the channel's channel label.
//!
//! The same rules bound the candidate pool of the resolver and the routing
//! lookups of the query API.

use crate::domain::agent::AgentResource;
use crate::domain::resource::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SUBSET_LABEL_KEY: &str = "capwire.io/subset";
pub const TENANT_LABEL_KEY: &str = "tenant";
pub const CHANNEL_LABEL_KEY: &str = "channel";
pub const DEFAULT_SUBSET: &str = "stable";

/// Consumer-side scoping labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelScope {
    pub subset: Option<String>,
    pub tenant: Option<String>,
    pub channel: Option<String>,
}

impl ChannelScope {
    pub fn new(
        subset: Option<impl Into<String>>,
        tenant: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            subset: subset.map(Into::into),
            tenant: Some(tenant.into()),
            channel: Some(channel.into()),
        }
    }

    pub fn from_metadata(metadata: &ObjectMeta) -> Self {
        Self {
            subset: metadata.label(SUBSET_LABEL_KEY).map(str::to_string),
            tenant: metadata.label(TENANT_LABEL_KEY).map(str::to_string),
            channel: metadata.label(CHANNEL_LABEL_KEY).map(str::to_string),
        }
    }

    pub fn effective_subset(&self) -> &str {
        self.subset.as_deref().unwrap_or(DEFAULT_SUBSET)
    }
}

/// Provider-side scoping labels, borrowed from an agent.
#[derive(Debug, Clone, Copy)]
pub struct ProviderScope<'a> {
    pub subset: Option<&'a str>,
    pub supported_tenants: &'a BTreeSet<String>,
    pub supported_channels: &'a BTreeSet<String>,
}

impl<'a> ProviderScope<'a> {
    pub fn of(agent: &'a AgentResource) -> Self {
        Self {
            subset: agent.metadata.label(SUBSET_LABEL_KEY),
            supported_tenants: &agent.spec.supported_tenants,
            supported_channels: &agent.spec.supported_channels,
        }
    }

    pub fn effective_subset(&self) -> &str {
        self.subset.unwrap_or(DEFAULT_SUBSET)
    }
}

pub struct ScopeFilter;

impl ScopeFilter {
    pub fn is_eligible(consumer: &ChannelScope, provider: &ProviderScope<'_>) -> bool {
        if consumer.effective_subset() != provider.effective_subset() {
            return false;
        }

        let tenant_matches = provider.supported_tenants.is_empty()
            || consumer
                .tenant
                .as_ref()
                .is_some_and(|tenant| provider.supported_tenants.contains(tenant));

        // No default here: an agent must list the channel explicitly.
        let channel_matches = consumer
            .channel
            .as_ref()
            .is_some_and(|channel| provider.supported_channels.contains(channel));

        tenant_matches && channel_matches
    }

    pub fn accepts(consumer: &ChannelScope, agent: &AgentResource) -> bool {
        Self::is_eligible(consumer, &ProviderScope::of(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn provider<'a>(
        subset: Option<&'a str>,
        tenants: &'a BTreeSet<String>,
        channels: &'a BTreeSet<String>,
    ) -> ProviderScope<'a> {
        ProviderScope {
            subset,
            supported_tenants: tenants,
            supported_channels: channels,
        }
    }

    #[test]
    fn test_empty_tenants_support_everyone() {
        let tenants = set(&[]);
        let channels = set(&["web"]);
        let consumer = ChannelScope::new(None::<String>, "anyone", "web");
        assert!(ScopeFilter::is_eligible(&consumer, &provider(None, &tenants, &channels)));
    }

    #[test]
    fn test_listed_tenants_reject_others() {
        let tenants = set(&["acme"]);
        let channels = set(&["web"]);
        let p = provider(None, &tenants, &channels);
        assert!(ScopeFilter::is_eligible(&ChannelScope::new(None::<String>, "acme", "web"), &p));
        assert!(!ScopeFilter::is_eligible(&ChannelScope::new(None::<String>, "other", "web"), &p));
    }

    #[test]
    fn test_unlabeled_subsets_default_to_stable() {
        let tenants = set(&[]);
        let channels = set(&["web"]);
        let consumer = ChannelScope::new(None::<String>, "acme", "web");
        assert!(ScopeFilter::is_eligible(&consumer, &provider(None, &tenants, &channels)));
        assert!(ScopeFilter::is_eligible(&consumer, &provider(Some("stable"), &tenants, &channels)));
        assert!(!ScopeFilter::is_eligible(&consumer, &provider(Some("canary"), &tenants, &channels)));

        let canary = ChannelScope::new(Some("canary"), "acme", "web");
        assert!(!ScopeFilter::is_eligible(&canary, &provider(None, &tenants, &channels)));
        assert!(ScopeFilter::is_eligible(&canary, &provider(Some("canary"), &tenants, &channels)));
    }

    #[test]
    fn test_channel_must_be_listed_explicitly() {
        let tenants = set(&[]);
        let none = set(&[]);
        let web = set(&["web"]);
        let consumer = ChannelScope::new(None::<String>, "acme", "mobile");
        assert!(!ScopeFilter::is_eligible(&consumer, &provider(None, &tenants, &none)));
        assert!(!ScopeFilter::is_eligible(&consumer, &provider(None, &tenants, &web)));
    }

    #[test]
    fn test_consumer_without_channel_label_matches_nothing() {
        let tenants = set(&[]);
        let web = set(&["web"]);
        let consumer = ChannelScope::default();
        assert!(!ScopeFilter::is_eligible(&consumer, &provider(None, &tenants, &web)));
    }

    #[test]
    fn test_scope_from_metadata() {
        let metadata = ObjectMeta::new("shop", "acme-web-stable")
            .with_label(TENANT_LABEL_KEY, "acme")
            .with_label(CHANNEL_LABEL_KEY, "web");
        let scope = ChannelScope::from_metadata(&metadata);
        assert_eq!(scope.tenant.as_deref(), Some("acme"));
        assert_eq!(scope.channel.as_deref(), Some("web"));
        assert_eq!(scope.effective_subset(), DEFAULT_SUBSET);
    }
}
