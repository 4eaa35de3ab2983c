//! Configuration management for Gatekeeper.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `GATEKEEPER__`-prefixed environment variables, e.g.
//! `GATEKEEPER__ADMISSION__SWEEP_INTERVAL_SECS=5`. It is read once at startup.
//!
//! A YAML `endpoints` table replaces the built-in one. Environment overrides
//! are merged field by field, so
//! `GATEKEEPER__ADMISSION__ENDPOINTS__CLASSIFY__MAX_REQUESTS=3` changes one
//! field of one endpoint and keeps every other endpoint. Endpoint names are
//! case-insensitive and stored lowercased.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::admission::{endpoint_key, EndpointPolicy, DEFAULT_MAX_TRACKED_IDENTITIES};
use crate::error::{GatekeeperError, Result};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "GATEKEEPER";
/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Main configuration for Gatekeeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Admission control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Identities each controller tracks before evicting the least recent
    #[serde(default = "default_max_tracked_identities")]
    pub max_tracked_identities: usize,

    /// Background sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Policy for endpoints without their own; unconfigured endpoints are
    /// admitted freely when absent
    #[serde(default)]
    pub default_policy: Option<EndpointPolicy>,

    /// Per-endpoint policies
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<String, EndpointPolicy>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_tracked_identities: default_max_tracked_identities(),
            sweep_interval_secs: default_sweep_interval(),
            default_policy: None,
            endpoints: default_endpoints(),
        }
    }
}

fn default_max_tracked_identities() -> usize {
    DEFAULT_MAX_TRACKED_IDENTITIES
}

fn default_sweep_interval() -> u64 {
    30
}

/// The AI-backed endpoints are limited out of the box; health checks are not.
fn default_endpoints() -> BTreeMap<String, EndpointPolicy> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("classify".to_string(), EndpointPolicy::default());
    endpoints.insert("generate-reply".to_string(), EndpointPolicy::default());
    endpoints
}

impl AdmissionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Lowercase endpoint names, rejecting names that collide once lowercased.
    pub fn normalize_endpoints(&mut self) -> Result<()> {
        let mut normalized = BTreeMap::new();
        for (name, policy) in std::mem::take(&mut self.endpoints) {
            let key = endpoint_key(&name).into_owned();
            if normalized.contains_key(&key) {
                return Err(GatekeeperError::Config(format!(
                    "endpoint '{}' is configured more than once",
                    key
                )));
            }
            normalized.insert(key, policy);
        }
        self.endpoints = normalized;
        Ok(())
    }

    /// Validate global settings and every policy.
    pub fn validate(&self) -> Result<()> {
        if self.max_tracked_identities == 0 {
            return Err(GatekeeperError::Config(
                "max_tracked_identities must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(GatekeeperError::Config(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        if let Some(policy) = &self.default_policy {
            policy.validate(crate::admission::FALLBACK_ENDPOINT)?;
        }
        for (endpoint, policy) in &self.endpoints {
            policy.validate(endpoint)?;
        }
        Ok(())
    }
}

impl GatekeeperConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`GatekeeperConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    fn load_with_env(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        // Parsed with serde_yaml so the file's own tables are kept as written
        let base = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::parse_yaml(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };

        let merged: GatekeeperConfig = config::Config::builder()
            .add_source(config::Config::try_from(&base)?)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        merged.finish()
    }

    /// Load configuration from a YAML file path, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::parse_yaml(yaml)?.finish()
    }

    fn parse_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Normalize and validate a freshly parsed configuration.
    fn finish(mut self) -> Result<Self> {
        self.admission.normalize_endpoints()?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.admission.validate()
    }
}
