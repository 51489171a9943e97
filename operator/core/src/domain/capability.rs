// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Value Objects
//!
//! - [`RequiredCapability`]: what a Channel needs, parsed from its spec.
//! - [`ProvidedCapability`]: what an Agent offers, taken from its manifest.
//! - [`StrategyTag`]: names the version-selection policy of a requirement.
//!
//! Versions are compared with [`semver`]. Providers frequently publish short
//! versions such as `1.0`; [`coerce_version`] pads them to a full
//! `major.minor.patch` before comparison.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version-selection policy declared on a requirement.
///
/// | Tag | `version` is read as | Winner |
/// |-----|----------------------|--------|
/// | `Highest` | a semver range (`1.0` = `^1.0`, `*` = any) | greatest satisfying version |
/// | `Exact` | a single version, coerced | first candidate equal to it |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyTag {
    #[default]
    Highest,
    Exact,
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyTag::Highest => write!(f, "HIGHEST"),
            StrategyTag::Exact => write!(f, "EXACT"),
        }
    }
}

/// A capability a Channel requires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredCapability {
    pub id: String,

    /// Display name; falls back to the id when omitted.
    #[serde(default)]
    pub name: String,

    /// Version constraint, interpreted according to `strategy`.
    #[serde(default = "default_version_constraint")]
    pub version: String,

    #[serde(default)]
    pub strategy: StrategyTag,
}

impl RequiredCapability {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: version.into(),
            strategy: StrategyTag::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyTag) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl fmt::Display for RequiredCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.id, self.version, self.strategy)
    }
}

/// A capability an Agent provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedCapability {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl ProvidedCapability {
    /// Parsed version, `None` when the published string is not a version.
    pub fn semver(&self) -> Option<Version> {
        coerce_version(&self.version)
    }
}

fn default_version_constraint() -> String {
    "*".to_string()
}

/// Parse a possibly short version (`1`, `1.2`, `v1.2.3`) into a full [`Version`].
pub fn coerce_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Split off pre-release/build suffixes before padding the numeric core.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_short_versions() {
        assert_eq!(coerce_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(coerce_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(coerce_version("v2.3.4"), Some(Version::new(2, 3, 4)));
        assert_eq!(coerce_version(" 1.0 "), Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_coerce_keeps_prerelease() {
        let version = coerce_version("1.0-beta.1").unwrap();
        assert_eq!(version.major, 1);
        assert_eq!(version.pre.as_str(), "beta.1");
    }

    #[test]
    fn test_coerce_rejects_garbage() {
        assert_eq!(coerce_version(""), None);
        assert_eq!(coerce_version("latest"), None);
        assert_eq!(coerce_version("1..2"), None);
        assert_eq!(coerce_version("1.2.3.4"), None);
    }

    #[test]
    fn test_required_capability_defaults() {
        let required: RequiredCapability = serde_json::from_str(r#"{"id": "ordering"}"#).unwrap();
        assert_eq!(required.version, "*");
        assert_eq!(required.strategy, StrategyTag::Highest);
        assert_eq!(required.display_name(), "ordering");
    }

    #[test]
    fn test_strategy_tag_wire_format() {
        let required: RequiredCapability =
            serde_json::from_str(r#"{"id": "billing", "name": "Billing", "version": "2.1", "strategy": "EXACT"}"#)
                .unwrap();
        assert_eq!(required.strategy, StrategyTag::Exact);
        assert_eq!(required.to_string(), "billing@2.1 (EXACT)");
    }
}
