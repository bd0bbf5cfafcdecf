//! File-backed response store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<generation-id>/generation.json     namespace, version, created_at
//! <root>/<generation-id>/entries/<key-hash>  JSON head line, then raw body
//! ```
//!
//! Entries are written to a temporary file and renamed into place, so a
//! reader never sees a torn entry and racing writers resolve to the last
//! rename.

use super::{Generation, GenerationName, ResponseStore};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

const META_FILE: &str = "generation.json";
const ENTRIES_DIR: &str = "entries";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Labels recorded with each generation directory
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenerationMeta {
    namespace: String,
    version: String,
    created_at: DateTime<Utc>,
}

impl GenerationMeta {
    fn name(&self) -> GenerationName {
        GenerationName::new(self.namespace.clone(), self.version.clone())
    }
}

/// Everything about an entry except its body
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHead {
    key: RequestKey,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    url: Option<String>,
    stored_at: DateTime<Utc>,
}

/// SHA256 of the parts joined by NUL, truncated to `bytes` bytes of hex
fn short_hash(parts: &[&str], bytes: usize) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    let result = hasher.finalize();
    hex::encode(&result[..bytes])
}

fn generation_id(name: &GenerationName) -> String {
    short_hash(&[&name.namespace, &name.version], 8)
}

fn entry_file_name(key: &RequestKey) -> String {
    short_hash(&[key.method.as_str(), &key.url], 16)
}

async fn write_atomic(path: &Path, contents: &[u8]) -> ShellCacheResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, contents)
        .await
        .map_err(|e| ShellCacheError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| ShellCacheError::io(format!("renaming into {}", path.display()), e))
}

fn encode_entry(key: &RequestKey, response: &Response) -> ShellCacheResult<Vec<u8>> {
    let head = EntryHead {
        key: key.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        headers: response.headers.clone(),
        url: response.url.clone(),
        stored_at: Utc::now(),
    };
    let mut bytes = serde_json::to_vec(&head)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&response.body);
    Ok(bytes)
}

fn decode_entry(path: &Path, bytes: &[u8]) -> ShellCacheResult<(EntryHead, Vec<u8>)> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| ShellCacheError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: "missing head terminator".to_string(),
        })?;
    let head: EntryHead =
        serde_json::from_slice(&bytes[..split]).map_err(|e| ShellCacheError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok((head, bytes[split + 1..].to_vec()))
}

async fn read_optional(path: &Path) -> ShellCacheResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ShellCacheError::io(format!("reading {}", path.display()), e)),
    }
}

async fn ensure_layout(dir: &Path, name: &GenerationName) -> ShellCacheResult<()> {
    fs::create_dir_all(dir.join(ENTRIES_DIR))
        .await
        .map_err(|e| ShellCacheError::io(format!("creating generation {}", name), e))?;

    let meta_path = dir.join(META_FILE);
    if read_optional(&meta_path).await?.is_none() {
        let meta = GenerationMeta {
            namespace: name.namespace.clone(),
            version: name.version.clone(),
            created_at: Utc::now(),
        };
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await?;
        debug!("Created generation {} at {}", name, dir.display());
    }
    Ok(())
}

/// One generation stored as a directory
pub struct DiskGeneration {
    name: GenerationName,
    dir: PathBuf,
}

impl DiskGeneration {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.dir.join(ENTRIES_DIR).join(entry_file_name(key))
    }
}

#[async_trait]
impl Generation for DiskGeneration {
    fn name(&self) -> &GenerationName {
        &self.name
    }

    /// Fails once the generation has been deleted; only `open` lays it out
    async fn put(&self, key: &RequestKey, response: &Response) -> ShellCacheResult<()> {
        let bytes = encode_entry(key, response)?;
        write_atomic(&self.entry_path(key), &bytes).await
    }

    async fn lookup(&self, key: &RequestKey) -> ShellCacheResult<Option<Response>> {
        let path = self.entry_path(key);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };

        let (head, body) = decode_entry(&path, &bytes)?;
        if &head.key != key {
            debug!("Entry hash collision at {}, treating as miss", path.display());
            return Ok(None);
        }

        Ok(Some(Response {
            status: head.status,
            status_text: head.status_text,
            headers: head.headers,
            body,
            url: head.url,
        }))
    }

    async fn keys(&self) -> ShellCacheResult<Vec<RequestKey>> {
        let entries_dir = self.dir.join(ENTRIES_DIR);
        let mut entries = match fs::read_dir(&entries_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(ShellCacheError::io(
                    format!("reading {}", entries_dir.display()),
                    e,
                ))
            }
        };

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShellCacheError::io("reading generation entry", e))?
        {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if let Some(bytes) = read_optional(&path).await? {
                let (head, _) = decode_entry(&path, &bytes)?;
                keys.push(head.key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Store keeping each generation in a directory under `root`
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, name: &GenerationName) -> PathBuf {
        self.root.join(generation_id(name))
    }
}

#[async_trait]
impl ResponseStore for DiskStore {
    async fn open(&self, name: &GenerationName) -> ShellCacheResult<Arc<dyn Generation>> {
        let dir = self.generation_dir(name);
        ensure_layout(&dir, name).await?;
        Ok(Arc::new(DiskGeneration {
            name: name.clone(),
            dir,
        }))
    }

    async fn get(&self, name: &GenerationName) -> ShellCacheResult<Option<Arc<dyn Generation>>> {
        if !self.contains(name).await? {
            return Ok(None);
        }
        Ok(Some(Arc::new(DiskGeneration {
            name: name.clone(),
            dir: self.generation_dir(name),
        })))
    }

    async fn contains(&self, name: &GenerationName) -> ShellCacheResult<bool> {
        let meta = read_optional(&self.generation_dir(name).join(META_FILE)).await?;
        Ok(meta.is_some())
    }

    async fn generations(&self) -> ShellCacheResult<Vec<GenerationName>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(ShellCacheError::io(
                    format!("reading store {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShellCacheError::io("reading store entry", e))?
        {
            let meta_path = entry.path().join(META_FILE);
            let Ok(Some(bytes)) = read_optional(&meta_path).await else {
                continue;
            };
            match serde_json::from_slice::<GenerationMeta>(&bytes) {
                Ok(meta) => names.push(meta.name()),
                Err(e) => debug!("Skipping unreadable generation {}: {}", meta_path.display(), e),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &GenerationName) -> ShellCacheResult<bool> {
        let dir = self.generation_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellCacheError::GenerationDelete {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn store_name(&self) -> &'static str {
        "disk"
    }
}
