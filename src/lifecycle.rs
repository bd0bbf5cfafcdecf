//! Cache lifecycle controller
//!
//! Drives one agent version through install and activate:
//!
//! | State | Entered by | Meaning |
//! |-------|------------|---------|
//! | uninstalled | construction | nothing done yet |
//! | installing | `install()` | manifest being fetched |
//! | installed | install success, `restore()` | generation complete, waiting |
//! | activating | `activate()` | stale generations being deleted |
//! | active | activate success | serving fetches |
//! | redundant | install failure | never promoted |
//!
//! Install writes nothing unless every manifest URL was fetched, and a
//! generation created by a failed install is deleted again.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::host::Host;
use crate::http::{Request, RequestKey, Response};
use crate::manifest::PrecacheManifest;
use crate::network::Network;
use crate::store::{GenerationName, ResponseStore};
use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle state of one agent version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl AgentState {
    /// Whether the state machine allows moving to `to`
    pub fn can_transition_to(self, to: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (Uninstalled | Installed | Redundant, Installing)
                | (Installing, Installed | Redundant)
                | (Uninstalled | Redundant, Installed)
                | (Installed | Active, Activating)
                | (Activating, Active | Installed)
        )
    }

    /// Whether fetch events are served in this state
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Result of one activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale generations removed
    pub deleted: Vec<GenerationName>,
    /// Stale generations that could not be removed, with the reason
    pub failed: Vec<(GenerationName, String)>,
}

impl ActivationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns generation creation and destruction for one agent version
pub struct LifecycleController {
    store: Arc<dyn ResponseStore>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
    generation: GenerationName,
    manifest: PrecacheManifest,
    state: watch::Sender<AgentState>,
}

impl LifecycleController {
    pub fn new(
        generation: GenerationName,
        manifest: PrecacheManifest,
        store: Arc<dyn ResponseStore>,
        network: Arc<dyn Network>,
        host: Arc<dyn Host>,
    ) -> Self {
        let (state, _) = watch::channel(AgentState::Uninstalled);
        Self {
            store,
            network,
            host,
            generation,
            manifest,
            state,
        }
    }

    /// Generation this version installs into
    pub fn generation(&self) -> &GenerationName {
        &self.generation
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    fn transition(&self, to: AgentState) -> ShellCacheResult<()> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if state.can_transition_to(to) {
                debug!("Agent {}: {} -> {}", self.generation, state, to);
                *state = to;
                true
            } else {
                result = Err(ShellCacheError::InvalidTransition { from: *state, to });
                false
            }
        });
        result
    }

    /// Populate the generation from the manifest
    ///
    /// On success the host is told to skip waiting. On failure the agent
    /// becomes redundant and the error is returned to the caller.
    pub async fn install(&self) -> ShellCacheResult<()> {
        self.transition(AgentState::Installing)?;
        info!("Installing generation {}", self.generation);

        match self.precache().await {
            Ok(count) => {
                self.transition(AgentState::Installed)?;
                info!("Precached {} entries into {}", count, self.generation);
                self.host.skip_waiting().await;
                Ok(())
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.generation, e);
                self.transition(AgentState::Redundant)?;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> ShellCacheResult<usize> {
        let existed = self.store.contains(&self.generation).await?;
        let generation = self.store.open(&self.generation).await?;

        let result: ShellCacheResult<usize> = async {
            let entries = try_join_all(
                self.manifest
                    .urls()
                    .iter()
                    .map(|url| self.fetch_manifest_entry(url)),
            )
            .await?;
            generation.put_all(&entries).await?;
            Ok(entries.len())
        }
        .await;

        if result.is_err() && !existed {
            self.discard_partial().await;
        }
        result
    }

    async fn fetch_manifest_entry(&self, url: &Url) -> ShellCacheResult<(RequestKey, Response)> {
        let request = Request::get(url.clone());
        let response =
            self.network
                .fetch(&request)
                .await
                .map_err(|e| ShellCacheError::ManifestFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        if !response.is_success() {
            return Err(ShellCacheError::ManifestFetch {
                url: url.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        debug!("Precached {}", url);
        Ok((request.key(), response))
    }

    async fn discard_partial(&self) {
        match self.store.delete(&self.generation).await {
            Ok(_) => debug!("Discarded partial generation {}", self.generation),
            Err(e) => warn!(
                "Failed to discard partial generation {}: {}",
                self.generation, e
            ),
        }
    }

    /// Mark an already-populated generation as installed
    ///
    /// Used when a host restarts and finds the generation from an earlier
    /// install. Returns `false` if the generation does not exist.
    pub async fn restore(&self) -> ShellCacheResult<bool> {
        if !self.store.contains(&self.generation).await? {
            return Ok(false);
        }
        if matches!(self.state(), AgentState::Installed | AgentState::Active) {
            return Ok(true);
        }
        self.transition(AgentState::Installed)?;
        info!("Restored installed generation {}", self.generation);
        Ok(true)
    }

    /// Delete stale generations of this namespace and claim clients
    ///
    /// Deletions run independently; a failed one is reported, not fatal.
    pub async fn activate(&self) -> ShellCacheResult<ActivationReport> {
        let previous = self.state();
        self.transition(AgentState::Activating)?;
        info!("Activating generation {}", self.generation);

        let report = match self.delete_stale().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Could not list generations: {}", e);
                self.transition(previous)?;
                return Err(e);
            }
        };

        self.host.claim_clients().await;
        self.transition(AgentState::Active)?;
        Ok(report)
    }

    async fn delete_stale(&self) -> ShellCacheResult<ActivationReport> {
        let namespace = &self.generation.namespace;
        let stale: Vec<GenerationName> = self
            .store
            .generations()
            .await?
            .into_iter()
            .filter(|name| name.belongs_to(namespace) && name != &self.generation)
            .collect();

        let results = join_all(stale.into_iter().map(|name| async move {
            let result = self.store.delete(&name).await;
            (name, result)
        }))
        .await;

        let mut report = ActivationReport::default();
        for (name, result) in results {
            match result {
                Ok(true) => {
                    info!("Deleted stale generation {}", name);
                    report.deleted.push(name);
                }
                Ok(false) => debug!("Stale generation {} already gone", name),
                Err(e) => {
                    warn!("Failed to delete stale generation {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}
