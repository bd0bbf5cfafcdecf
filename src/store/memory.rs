//! In-memory response store

use super::{Generation, GenerationName, ResponseStore};
use crate::error::ShellCacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One generation held in memory
///
/// A handle stays usable after its generation is deleted from the store,
/// but is detached from it.
pub struct MemoryGeneration {
    name: GenerationName,
    entries: RwLock<HashMap<RequestKey, Response>>,
}

impl MemoryGeneration {
    fn new(name: GenerationName) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Generation for MemoryGeneration {
    fn name(&self) -> &GenerationName {
        &self.name
    }

    async fn put(&self, key: &RequestKey, response: &Response) -> ShellCacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn put_all(&self, entries: &[(RequestKey, Response)]) -> ShellCacheResult<()> {
        let mut map = self.entries.write().await;
        for (key, response) in entries {
            map.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn lookup(&self, key: &RequestKey) -> ShellCacheResult<Option<Response>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn keys(&self) -> ShellCacheResult<Vec<RequestKey>> {
        let mut keys: Vec<RequestKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Store keeping every generation in process memory
#[derive(Default)]
pub struct MemoryStore {
    generations: RwLock<BTreeMap<GenerationName, Arc<MemoryGeneration>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn open(&self, name: &GenerationName) -> ShellCacheResult<Arc<dyn Generation>> {
        let mut generations = self.generations.write().await;
        let generation: Arc<dyn Generation> = generations
            .entry(name.clone())
            .or_insert_with(|| Arc::new(MemoryGeneration::new(name.clone())))
            .clone();
        Ok(generation)
    }

    async fn get(&self, name: &GenerationName) -> ShellCacheResult<Option<Arc<dyn Generation>>> {
        Ok(self
            .generations
            .read()
            .await
            .get(name)
            .map(|generation| Arc::clone(generation) as Arc<dyn Generation>))
    }

    async fn contains(&self, name: &GenerationName) -> ShellCacheResult<bool> {
        Ok(self.generations.read().await.contains_key(name))
    }

    async fn generations(&self) -> ShellCacheResult<Vec<GenerationName>> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &GenerationName) -> ShellCacheResult<bool> {
        Ok(self.generations.write().await.remove(name).is_some())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
