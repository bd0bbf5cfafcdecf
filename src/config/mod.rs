//! Configuration management for shellcache

pub mod schema;

pub use schema::Config;

use crate::error::{ShellCacheError, ShellCacheResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Locates, reads and writes the configuration file
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use `path`, or `<config_dir>/shellcache/config.toml` when absent
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shellcache")
                .join("config.toml")
        });
        Self { path }
    }

    /// Response store directory: `store.dir`, else under the state directory
    pub fn store_dir(config: &Config) -> PathBuf {
        config.store.dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shellcache")
                .join("store")
        })
    }

    /// Read the file; a missing file yields the defaults
    pub async fn load(&self) -> ShellCacheResult<Config> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ShellCacheError::io(
                    format!("reading config from {}", self.path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| ShellCacheError::ConfigInvalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub async fn save(&self, config: &Config) -> ShellCacheResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShellCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        fs::write(&self.path, toml::to_string_pretty(config)?)
            .await
            .map_err(|e| ShellCacheError::io(format!("writing {}", self.path.display()), e))?;

        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
