//! Generational response store
//!
//! A store holds named generations; each generation is a key-value map of
//! request identity to response snapshot. Generations carry an explicit
//! namespace tag so an agent only ever cleans up its own generations.
//!
//! # Generation lifecycle
//!
//! | Step | Who | Effect |
//! |------|-----|--------|
//! | open | lifecycle controller | creates the generation if absent |
//! | get | interceptor | existing generation only, never creates |
//! | put | controller (install), interceptor (refill) | adds or overwrites an entry |
//! | delete | controller (activate) | drops the generation and all entries |

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::error::ShellCacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of one generation: an owned namespace plus a version token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenerationName {
    pub namespace: String,
    pub version: String,
}

impl GenerationName {
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
        }
    }

    /// Whether this generation is owned by `namespace`
    pub fn belongs_to(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }
}

impl fmt::Display for GenerationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.version)
    }
}

/// Handle to one opened generation
#[async_trait]
pub trait Generation: Send + Sync {
    /// The generation this handle writes into
    fn name(&self) -> &GenerationName;

    /// Store a response, overwriting any entry with the same key
    async fn put(&self, key: &RequestKey, response: &Response) -> ShellCacheResult<()>;

    /// Store several responses
    async fn put_all(&self, entries: &[(RequestKey, Response)]) -> ShellCacheResult<()> {
        for (key, response) in entries {
            self.put(key, response).await?;
        }
        Ok(())
    }

    /// Find the stored response for a key
    async fn lookup(&self, key: &RequestKey) -> ShellCacheResult<Option<Response>>;

    /// All keys currently stored, sorted
    async fn keys(&self) -> ShellCacheResult<Vec<RequestKey>>;
}

/// Persistent, origin-scoped store of generations
///
/// Implemented in memory for embedding and tests, and on disk for the CLI.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Open a generation, creating it if absent
    async fn open(&self, name: &GenerationName) -> ShellCacheResult<Arc<dyn Generation>>;

    /// Existing generation, or `None` without creating it
    async fn get(&self, name: &GenerationName) -> ShellCacheResult<Option<Arc<dyn Generation>>>;

    /// Whether a generation exists
    async fn contains(&self, name: &GenerationName) -> ShellCacheResult<bool>;

    /// All generations in the store, from every namespace
    async fn generations(&self) -> ShellCacheResult<Vec<GenerationName>>;

    /// Delete a generation; `false` if it did not exist
    async fn delete(&self, name: &GenerationName) -> ShellCacheResult<bool>;

    /// Human-readable store kind for display
    fn store_name(&self) -> &'static str;
}
