//! Event dispatch for one agent version
//!
//! Binds the three host signals (install, activate, fetch) to the
//! lifecycle controller and the fetch interceptor. Every event is an async
//! task: the host awaits the returned future before treating the event as
//! resolved.

use crate::config::schema::AgentConfig;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::host::Host;
use crate::http::{resolve_url, Request};
use crate::interceptor::{FetchInterceptor, FetchOutcome};
use crate::lifecycle::{ActivationReport, AgentState, LifecycleController};
use crate::manifest::PrecacheManifest;
use crate::network::Network;
use crate::store::{GenerationName, ResponseStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

/// Signal delivered by the host
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
}

/// Resolution of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed,
    Activated(ActivationReport),
    Fetched(FetchOutcome),
}

/// One deployed version of the caching agent
pub struct Agent {
    scope: Url,
    controller: LifecycleController,
    interceptor: FetchInterceptor,
}

impl Agent {
    /// Build an agent from configuration and injected collaborators
    pub fn from_config(
        config: &AgentConfig,
        store: Arc<dyn ResponseStore>,
        network: Arc<dyn Network>,
        host: Arc<dyn Host>,
    ) -> ShellCacheResult<Self> {
        let scope = Url::parse(&config.scope).map_err(|e| ShellCacheError::InvalidUrl {
            url: config.scope.clone(),
            reason: e.to_string(),
        })?;
        let manifest = PrecacheManifest::resolve(&scope, &config.manifest)?;
        let fallback = Request::get(resolve_url(&scope, &config.offline_fallback)?).key();
        let generation = config.generation();

        debug!(
            "Agent {} with {} manifest entries, fallback {}",
            generation,
            manifest.len(),
            fallback.url
        );

        Ok(Self {
            scope,
            controller: LifecycleController::new(
                generation.clone(),
                manifest,
                Arc::clone(&store),
                Arc::clone(&network),
                host,
            ),
            interceptor: FetchInterceptor::new(generation, fallback, store, network),
        })
    }

    /// Base URL relative requests are resolved against
    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn generation(&self) -> &GenerationName {
        self.controller.generation()
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        self.controller.manifest()
    }

    pub fn state(&self) -> AgentState {
        self.controller.state()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.controller.subscribe()
    }

    /// Resolve a URL relative to the scope
    pub fn resolve(&self, raw: &str) -> ShellCacheResult<Url> {
        resolve_url(&self.scope, raw)
    }

    /// Handle one host signal
    pub async fn dispatch(&self, event: Event) -> ShellCacheResult<EventOutcome> {
        match event {
            Event::Install => {
                self.install().await?;
                Ok(EventOutcome::Installed)
            }
            Event::Activate => Ok(EventOutcome::Activated(self.activate().await?)),
            Event::Fetch(request) => Ok(EventOutcome::Fetched(self.fetch(&request).await?)),
        }
    }

    pub async fn install(&self) -> ShellCacheResult<()> {
        self.controller.install().await
    }

    pub async fn activate(&self) -> ShellCacheResult<ActivationReport> {
        self.controller.activate().await
    }

    /// Intercept a request; declined until the agent is active
    pub async fn fetch(&self, request: &Request) -> ShellCacheResult<FetchOutcome> {
        if !self.state().is_active() {
            debug!("Agent not active ({}), passing through {}", self.state(), request.url);
            return Ok(FetchOutcome::Passthrough);
        }
        self.interceptor.handle(request).await
    }

    /// Mark the generation from an earlier install as installed
    pub async fn restore(&self) -> ShellCacheResult<bool> {
        self.controller.restore().await
    }

    /// Resume an agent whose generation was installed by an earlier run
    ///
    /// Activates it when the generation exists; otherwise the agent stays
    /// uninstalled.
    pub async fn start(&self) -> ShellCacheResult<AgentState> {
        if self.controller.restore().await? && self.state() == AgentState::Installed {
            self.controller.activate().await?;
        }
        Ok(self.state())
    }

    /// Wait for background write-backs to land
    pub async fn settle(&self) {
        self.interceptor.settle().await;
    }
}
