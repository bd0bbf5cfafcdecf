//! Error types for shellcache
//!
//! All modules use `ShellCacheResult<T>` as their return type.

use crate::lifecycle::AgentState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellCacheResult<T> = Result<T, ShellCacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellCacheError {
    // Lifecycle errors
    #[error("Precache failed for {url}: {reason}")]
    ManifestFetch { url: String, reason: String },

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: AgentState, to: AgentState },

    // Fetch errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Store errors
    #[error("Generation not found: {0}")]
    GenerationNotFound(String),

    #[error("Corrupt store entry at {path}: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Failed to delete generation {name}: {reason}")]
    GenerationDelete { name: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the transport rather than the store
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestFetch { .. } => {
                Some("Check that every manifest URL is reachable, then run: shellcache install")
            }
            Self::InvalidTransition {
                to: AgentState::Activating,
                ..
            }
            | Self::GenerationNotFound(_) => Some("Run: shellcache install"),
            Self::ConfigInvalid { .. } => Some("Run: shellcache config init --force"),
            _ => None,
        }
    }
}
