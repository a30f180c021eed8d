//! Node configuration types

use crate::error::Result;
use config::{Environment, File, FileFormat};
use knot_consensus::ConsensusConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment overrides, e.g. `KNOT__SYNC__MAX_EVENTS=500`
pub const ENV_PREFIX: &str = "KNOT";

/// Complete node configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identity settings
    #[serde(default)]
    pub node: NodeSettings,

    /// Consensus parameters
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Gossip sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Load from an optional TOML file, then apply `KNOT__*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let loaded = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: NodeConfig = loaded.try_deserialize()?;
        config.consensus.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml(document: &str) -> Result<Self> {
        let loaded = config::Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?;
        let config: NodeConfig = loaded.try_deserialize()?;
        config.consensus.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Basic node settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Node name
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Hex-encoded Ed25519 secret key; a fresh key is generated when absent
    #[serde(default)]
    pub secret_key: Option<String>,
}

fn default_node_name() -> String {
    "knot-node".to_string()
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            secret_key: None,
        }
    }
}

/// Gossip sync configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pause after each outgoing sync (ms)
    #[serde(default = "default_sync_interval")]
    pub interval_ms: u64,

    /// Maximum events carried by one sync message
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Capacity of the ordered-event broadcast channel
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_sync_interval() -> u64 {
    10
}

fn default_max_events() -> usize {
    1000
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sync_interval(),
            max_events: default_max_events(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Color output
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: true,
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metric name prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "knot".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_namespace(),
        }
    }
}
