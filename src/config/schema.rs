//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use crate::store::GenerationName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Agent identity and precache manifest
    pub agent: AgentConfig,

    /// Network transport settings
    pub network: NetworkConfig,

    /// Response store settings
    pub store: StoreConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Agent configuration
///
/// Fixed at deploy time; bumping `version` starts a new generation and
/// the next activation deletes the old ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Namespace owning this agent's generations
    pub namespace: String,

    /// Version token of the current generation
    pub version: String,

    /// Base URL the manifest and requests are resolved against
    pub scope: String,

    /// URLs precached on install, relative to `scope` or absolute
    pub manifest: Vec<String>,

    /// Document served to navigations when the network is unreachable
    pub offline_fallback: String,
}

impl AgentConfig {
    /// Name of the generation this configuration installs
    pub fn generation(&self) -> GenerationName {
        GenerationName::new(self.namespace.clone(), self.version.clone())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: "shellcache".to_string(),
            version: "v1".to_string(),
            scope: "http://localhost:8080/".to_string(),
            manifest: vec!["./".to_string(), "./index.html".to_string()],
            offline_fallback: "./index.html".to_string(),
        }
    }
}

/// Network transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Overall per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("shellcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Response store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory (defaults to the state directory)
    pub dir: Option<PathBuf>,
}
