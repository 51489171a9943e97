// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Resolution Engine
//!
//! Matches a channel's required capabilities against the capabilities of the
//! agents in scope and produces exactly one [`Wire`] per requirement.
//!
//! ```text
//! pool ──ScopeFilter──▶ CapabilityIndex ──candidates──▶ ResolutionStrategy ──▶ Wire
//!                                                 └── none ──▶ missing
//! ```
//!
//! Resolution is all-or-nothing with full reporting: every requirement is
//! evaluated, and if any of them is left without a provider the call fails
//! with the complete missing set and no wires at all.

use crate::domain::agent::AgentResource;
use crate::domain::capability::{coerce_version, ProvidedCapability, RequiredCapability, StrategyTag};
use crate::domain::scope::{ChannelScope, ScopeFilter};
use semver::{Prerelease, Version, VersionReq};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Candidates and wires
// ============================================================================

/// An eligible agent paired with its capability matching a requirement id.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub agent: &'a AgentResource,
    pub capability: &'a ProvidedCapability,
}

/// A resolved binding of one requirement to one agent capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    pub required: RequiredCapability,
    pub agent: AgentResource,
    pub provided: ProvidedCapability,
}

impl Wire {
    fn bind(required: &RequiredCapability, candidate: Candidate<'_>) -> Self {
        Self {
            required: required.clone(),
            agent: candidate.agent.clone(),
            provided: candidate.capability.clone(),
        }
    }
}

/// Complete result of a successful resolution, ordered by requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WireSet {
    wires: Vec<Wire>,
}

impl WireSet {
    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Wire> {
        self.wires.iter()
    }

    pub fn as_slice(&self) -> &[Wire] {
        &self.wires
    }

    pub fn for_requirement(&self, id: &str) -> Option<&Wire> {
        self.wires.iter().find(|w| w.required.id == id)
    }

    pub fn into_vec(self) -> Vec<Wire> {
        self.wires
    }
}

impl IntoIterator for WireSet {
    type Item = Wire;
    type IntoIter = std::vec::IntoIter<Wire>;

    fn into_iter(self) -> Self::IntoIter {
        self.wires.into_iter()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// No agents exist at all; a systemic absence rather than a mismatch.
    #[error("Resolve context is empty: no agents available to satisfy {count} required capabilities", count = .required.len())]
    EmptyProviderPool {
        required: BTreeSet<RequiredCapability>,
    },

    #[error("Required capabilities not resolved: {}", describe(.missing))]
    UnresolvedCapabilities {
        missing: BTreeSet<RequiredCapability>,
    },
}

impl ResolverError {
    /// Requirements left without a wire by this failure.
    pub fn unresolved(&self) -> &BTreeSet<RequiredCapability> {
        match self {
            ResolverError::EmptyProviderPool { required } => required,
            ResolverError::UnresolvedCapabilities { missing } => missing,
        }
    }
}

fn describe(missing: &BTreeSet<RequiredCapability>) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Capability index
// ============================================================================

/// Per-call view of the pool restricted to agents eligible for one scope.
pub struct CapabilityIndex<'a> {
    eligible: Vec<&'a AgentResource>,
}

impl<'a> CapabilityIndex<'a> {
    pub fn build(pool: &'a [AgentResource], scope: &ChannelScope) -> Self {
        let eligible = pool
            .iter()
            .filter(|agent| {
                let accepted = ScopeFilter::accepts(scope, agent);
                if !accepted {
                    debug!(agent = %agent.key(), "agent out of scope for channel");
                }
                accepted
            })
            .collect();
        Self { eligible }
    }

    pub fn eligible_agents(&self) -> usize {
        self.eligible.len()
    }

    /// Eligible (agent, capability) pairs for `capability_id`, in pool order.
    pub fn find_capability_providers(&self, capability_id: &str) -> Vec<Candidate<'a>> {
        self.eligible
            .iter()
            .filter_map(|agent| {
                agent.capability(capability_id).map(|capability| Candidate {
                    agent: *agent,
                    capability,
                })
            })
            .collect()
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Picks the single best candidate for a requirement.
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when no candidate satisfies the requirement's version.
    fn select_best<'a>(
        &self,
        candidates: &[Candidate<'a>],
        required: &RequiredCapability,
    ) -> Option<Candidate<'a>>;
}

/// Greatest version satisfying a semver range; first seen wins ties.
pub struct HighestVersionStrategy;

impl ResolutionStrategy for HighestVersionStrategy {
    fn name(&self) -> &'static str {
        "highest"
    }

    fn select_best<'a>(
        &self,
        candidates: &[Candidate<'a>],
        required: &RequiredCapability,
    ) -> Option<Candidate<'a>> {
        let Some(requirement) = parse_range(&required.version) else {
            debug!(required = %required, "unparsable version range");
            return None;
        };

        let mut best: Option<(Candidate<'a>, Version)> = None;
        for candidate in candidates {
            let Some(version) = candidate.capability.semver() else {
                debug!(agent = %candidate.agent.key(), version = %candidate.capability.version, "unparsable provided version");
                continue;
            };
            if !requirement.matches(&version) {
                continue;
            }
            let replace = match &best {
                Some((_, current)) => precedence(&version) > precedence(current),
                None => true,
            };
            if replace {
                best = Some((*candidate, version));
            }
        }
        best.map(|(candidate, _)| candidate)
    }
}

/// Exactly the requested version (after coercion); first seen wins.
pub struct ExactVersionStrategy;

impl ResolutionStrategy for ExactVersionStrategy {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn select_best<'a>(
        &self,
        candidates: &[Candidate<'a>],
        required: &RequiredCapability,
    ) -> Option<Candidate<'a>> {
        let target = coerce_version(&required.version)?;
        candidates.iter().copied().find(|candidate| {
            candidate
                .capability
                .semver()
                .is_some_and(|version| precedence(&version) == precedence(&target))
        })
    }
}

/// Built-in strategy for a requirement's tag.
pub fn strategy_for(tag: StrategyTag) -> &'static dyn ResolutionStrategy {
    match tag {
        StrategyTag::Highest => &HighestVersionStrategy,
        StrategyTag::Exact => &ExactVersionStrategy,
    }
}

fn parse_range(raw: &str) -> Option<VersionReq> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Some(VersionReq::STAR);
    }
    VersionReq::parse(trimmed).ok()
}

/// Semver precedence key; build metadata does not participate.
fn precedence(version: &Version) -> (u64, u64, u64, &Prerelease) {
    (version.major, version.minor, version.patch, &version.pre)
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves required capabilities against a provider pool.
#[derive(Clone, Default)]
pub struct Resolver {
    strategy_override: Option<Arc<dyn ResolutionStrategy>>,
}

impl Resolver {
    /// Resolver dispatching on each requirement's [`StrategyTag`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver applying `strategy` to every requirement regardless of tag.
    pub fn with_strategy(strategy: Arc<dyn ResolutionStrategy>) -> Self {
        Self {
            strategy_override: Some(strategy),
        }
    }

    fn strategy(&self, required: &RequiredCapability) -> &dyn ResolutionStrategy {
        match &self.strategy_override {
            Some(strategy) => strategy.as_ref(),
            None => strategy_for(required.strategy),
        }
    }

    pub fn resolve<'r>(
        &self,
        required: impl IntoIterator<Item = &'r RequiredCapability>,
        pool: &[AgentResource],
        scope: &ChannelScope,
    ) -> Result<WireSet, ResolverError> {
        // Sorted and deduplicated so the outcome never depends on input order.
        let required: BTreeSet<&RequiredCapability> = required.into_iter().collect();

        if pool.is_empty() {
            return Err(ResolverError::EmptyProviderPool {
                required: required.into_iter().cloned().collect(),
            });
        }

        let index = CapabilityIndex::build(pool, scope);
        let mut wires = Vec::with_capacity(required.len());
        let mut missing = BTreeSet::new();

        for requirement in required {
            let candidates = index.find_capability_providers(&requirement.id);
            if candidates.is_empty() {
                debug!(required = %requirement, "no eligible agent provides capability");
                missing.insert(requirement.clone());
                continue;
            }

            let strategy = self.strategy(requirement);
            match strategy.select_best(&candidates, requirement) {
                Some(best) => {
                    debug!(
                        required = %requirement,
                        agent = %best.agent.key(),
                        version = %best.capability.version,
                        strategy = strategy.name(),
                        "capability wired"
                    );
                    wires.push(Wire::bind(requirement, best));
                }
                None => {
                    debug!(
                        required = %requirement,
                        candidates = candidates.len(),
                        strategy = strategy.name(),
                        "no candidate satisfies version constraint"
                    );
                    missing.insert(requirement.clone());
                }
            }
        }

        if !missing.is_empty() {
            return Err(ResolverError::UnresolvedCapabilities { missing });
        }
        Ok(WireSet { wires })
    }
}
