//! Configuration for the access layer.
//!
//! Loaded once at startup from a TOML file and treated as read-only
//! thereafter. Besides engine connectivity this carries the two
//! environment-level index tuning override layers (see
//! [`crate::settings`] for the merge order).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub tuning: TuningOverrides,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Host specs, either `host` or `host:port`.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    /// Port applied to host specs that do not carry one.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for the export client profile (slow scrolls, large reads).
    #[serde(default = "default_export_timeout_secs")]
    pub export_timeout_secs: u64,
}

fn default_hosts() -> Vec<String> {
    vec!["localhost".to_string()]
}

fn default_port() -> u16 {
    9200
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_export_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            export_timeout_secs: default_export_timeout_secs(),
        }
    }
}

/// Environment-level index tuning overrides.
///
/// `default` applies to every index; `index` is keyed by an adapter's
/// settings key and wins over `default`. Values use the same keys the
/// built-in defaults use; the string `"__remove__"` unsets a key.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TuningOverrides {
    #[serde(default)]
    pub default: HashMap<String, Value>,
    #[serde(default)]
    pub index: HashMap<String, HashMap<String, Value>>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("{}: {e}", path.as_ref().display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}
