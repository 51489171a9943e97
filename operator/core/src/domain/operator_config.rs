// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Operator Configuration Types
//
// Kubernetes-style configuration manifest for the capwire operator:
// - alert webhook delivery
// - rollout reconciliation switches and timings
// - retry policy handed to the controller runtime
// - routing API subset handling (canary release)
// - channel resync interval and watched namespaces

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_API_VERSION: &str = "capwire.io/v1";
pub const CONFIG_KIND: &str = "OperatorConfig";

/// Top-level Kubernetes-style operator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfigManifest {
    /// API version (must be "capwire.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OperatorConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: OperatorConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Operator instance name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfigSpec {
    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub rollout: RolloutConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub channels: ChannelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Webhook receiving unresolved-channel alerts; unset disables delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Upper bound on one delivery attempt
    #[serde(default = "default_alert_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Reconcile rollouts into agents
    #[serde(default)]
    pub enabled: bool,

    /// Delay before re-checking a rollout that is not ready
    #[serde(default = "default_not_ready_requeue_secs")]
    pub not_ready_requeue_secs: u64,

    /// Manifest path on the rollout's service
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    #[serde(default = "default_manifest_timeout_ms")]
    pub manifest_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_interval_multiplier")]
    pub interval_multiplier: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Require an explicit `x-subset` header on routing queries
    #[serde(default = "default_true")]
    pub canary_release_enabled: bool,

    /// Namespace used when a query carries no `x-namespace` header
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Periodic re-evaluation of every channel
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    /// Namespaces whose channels are evaluated on resync
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_alert_timeout_ms(),
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            not_ready_requeue_secs: default_not_ready_requeue_secs(),
            manifest_path: default_manifest_path(),
            manifest_timeout_ms: default_manifest_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            interval_multiplier: default_interval_multiplier(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            canary_release_enabled: true,
            default_namespace: default_namespace(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval_secs(),
            namespaces: default_namespaces(),
        }
    }
}

impl AlertConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RolloutConfig {
    pub fn not_ready_requeue(&self) -> Duration {
        Duration::from_secs(self.not_ready_requeue_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_millis(self.manifest_timeout_ms)
    }
}

impl ChannelConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

impl Default for OperatorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: CONFIG_API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            metadata: ConfigMetadata {
                name: "capwire".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: OperatorConfigSpec::default(),
        }
    }
}

impl OperatorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. CAPWIRE_CONFIG_PATH environment variable
    /// 2. ./capwire-config.yaml (working directory)
    /// 3. ~/.capwire/config.yaml (user home)
    /// 4. /etc/capwire/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CAPWIRE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./capwire-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".capwire").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/capwire/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CAPWIRE_ALERT_WEBHOOK_URL") {
            if url.trim().is_empty() {
                self.spec.alert.webhook_url = None;
            } else {
                tracing::info!("Environment override: CAPWIRE_ALERT_WEBHOOK_URL set");
                self.spec.alert.webhook_url = Some(url);
            }
        }

        if let Some(enabled) = env_flag("CAPWIRE_CANARY_RELEASE_ENABLED") {
            self.spec.routing.canary_release_enabled = enabled;
        }

        if let Some(enabled) = env_flag("CAPWIRE_ROLLOUT_ENABLED") {
            self.spec.rollout.enabled = enabled;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != CONFIG_API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                CONFIG_API_VERSION
            );
        }

        if self.kind != CONFIG_KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, CONFIG_KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if let Some(url) = &self.spec.alert.webhook_url {
            url::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("Invalid alert.webhook_url '{}': {}", url, e))?;
        }

        if self.spec.alert.timeout_ms == 0 {
            anyhow::bail!("alert.timeout_ms must be greater than zero");
        }

        if self.spec.rollout.not_ready_requeue_secs == 0 {
            anyhow::bail!("rollout.not_ready_requeue_secs must be greater than zero");
        }

        let retry = &self.spec.retry;
        if retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !(retry.interval_multiplier >= 1.0 && retry.interval_multiplier.is_finite()) {
            anyhow::bail!(
                "retry.interval_multiplier must be a finite value >= 1.0, got {}",
                retry.interval_multiplier
            );
        }

        if self.spec.channels.resync_interval_secs == 0 {
            anyhow::bail!("channels.resync_interval_secs must be greater than zero");
        }

        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => {
            tracing::info!("Environment override: {}=true", name);
            Some(true)
        }
        "false" | "0" | "no" | "off" => {
            tracing::info!("Environment override: {}=false", name);
            Some(false)
        }
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                name,
                val
            );
            None
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_alert_timeout_ms() -> u64 {
    5_000
}

fn default_not_ready_requeue_secs() -> u64 {
    10
}

fn default_manifest_path() -> String {
    crate::domain::rollout::WELL_KNOWN_CAPABILITIES_PATH.to_string()
}

fn default_manifest_timeout_ms() -> u64 {
    10_000
}

fn default_initial_interval_ms() -> u64 {
    5_000
}

fn default_interval_multiplier() -> f64 {
    1.5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_namespace() -> String {
    crate::domain::resource::DEFAULT_NAMESPACE.to_string()
}

fn default_resync_interval_secs() -> u64 {
    300
}

fn default_namespaces() -> Vec<String> {
    vec![default_namespace()]
}
