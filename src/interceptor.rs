//! Fetch interceptor
//!
//! Cache first, network fallback, background refill:
//!
//! 1. Non-GET requests are declined and go to the network untouched.
//! 2. A stored response for the request identity is returned without
//!    touching the network.
//! 3. On a miss the network answers. A 200 is cloned; the clone is written
//!    back by a detached task while the original goes to the caller. Any
//!    other status is passed through and not stored.
//! 4. If the network fails for a navigation, the stored offline fallback
//!    document is returned instead. Other failures propagate.
//!
//! Write-backs never delay the response. They are spawned onto the runtime
//! and outlive the interceptor; [`FetchInterceptor::settle`] waits for the
//! ones still in flight, and hosts call it before shutting the runtime
//! down. Concurrent misses for the same identity are not merged and the
//! last write wins.
//!
//! The interceptor never creates a generation. If its generation is gone
//! (a newer version activated and deleted it) every lookup is a miss and
//! nothing is written back.

use crate::error::ShellCacheResult;
use crate::http::{Method, Request, RequestKey, Response};
use crate::network::Network;
use crate::store::{GenerationName, ResponseStore};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::OfflineFallback => write!(f, "offline-fallback"),
        }
    }
}

/// Decision for one intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Declined; the host performs default network handling
    Passthrough,
    /// Answered by the agent
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    /// The response, if the agent answered
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Passthrough => None,
            Self::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Self::Passthrough => None,
            Self::Respond { source, .. } => Some(*source),
        }
    }
}

/// Per-request cache/network arbitration over the active generation
pub struct FetchInterceptor {
    store: Arc<dyn ResponseStore>,
    network: Arc<dyn Network>,
    generation: GenerationName,
    fallback: RequestKey,
    write_backs: Mutex<Vec<JoinHandle<()>>>,
}

impl FetchInterceptor {
    /// `fallback` is the identity of the document served to offline navigations
    pub fn new(
        generation: GenerationName,
        fallback: RequestKey,
        store: Arc<dyn ResponseStore>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            store,
            network,
            generation,
            fallback,
            write_backs: Mutex::new(Vec::new()),
        }
    }

    pub fn generation(&self) -> &GenerationName {
        &self.generation
    }

    /// Decide how to answer `request`
    ///
    /// Errors are transport failures that had no fallback.
    pub async fn handle(&self, request: &Request) -> ShellCacheResult<FetchOutcome> {
        if request.method != Method::Get {
            debug!("Passing through {} {}", request.method, request.url);
            return Ok(FetchOutcome::Passthrough);
        }

        let key = request.key();
        if let Some(cached) = self.lookup(&key).await {
            debug!("Cache hit: {}", key.url);
            return Ok(FetchOutcome::Respond {
                response: cached,
                source: ResponseSource::Cache,
            });
        }

        debug!("Cache miss: {}", key.url);
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.write_back(key, response.clone());
                } else {
                    debug!("Not storing {} (status {})", key.url, response.status);
                }
                Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(e) if request.is_navigation() => match self.lookup(&self.fallback).await {
                Some(page) => {
                    info!("Offline fallback for navigation to {}", key.url);
                    Ok(FetchOutcome::Respond {
                        response: page,
                        source: ResponseSource::OfflineFallback,
                    })
                }
                None => {
                    warn!("No offline fallback stored for {}", self.fallback.url);
                    Err(e)
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Store read failures count as a miss
    async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        let result: ShellCacheResult<Option<Response>> = async {
            match self.store.get(&self.generation).await? {
                Some(generation) => generation.lookup(key).await,
                None => {
                    debug!("Generation {} is gone, treating as miss", self.generation);
                    Ok(None)
                }
            }
        }
        .await;

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Store lookup failed for {}: {}", key, e);
                None
            }
        }
    }

    fn write_back(&self, key: RequestKey, response: Response) {
        let store = Arc::clone(&self.store);
        let name = self.generation.clone();

        let task = tokio::spawn(async move {
            let result: ShellCacheResult<bool> = async {
                let Some(generation) = store.get(&name).await? else {
                    return Ok(false);
                };
                generation.put(&key, &response).await?;
                Ok(true)
            }
            .await;

            match result {
                Ok(true) => debug!("Stored {} in {}", key.url, name),
                Ok(false) => debug!("Generation {} is gone, not storing {}", name, key.url),
                Err(e) => warn!("Background store of {} failed: {}", key.url, e),
            }
        });

        let mut tasks = self.write_backs.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Number of write-backs still running
    pub fn pending_writes(&self) -> usize {
        self.write_backs
            .lock()
            .map(|tasks| tasks.iter().filter(|task| !task.is_finished()).count())
            .unwrap_or_default()
    }

    /// Wait for every background write-back to finish
    pub async fn settle(&self) {
        loop {
            let tasks = {
                let mut guard = self.write_backs.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *guard)
            };
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("Background store task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ScriptedNetwork;
    use crate::store::{Generation, MemoryStore};
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse("https://app.example/").unwrap().join(path).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        network: Arc<ScriptedNetwork>,
        interceptor: FetchInterceptor,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            store
                .open(&GenerationName::new("prefix", "v1"))
                .await
                .unwrap();
            let network = Arc::new(ScriptedNetwork::new());
            let interceptor = FetchInterceptor::new(
                GenerationName::new("prefix", "v1"),
                Request::get(url("/index.html")).key(),
                store.clone(),
                network.clone(),
            );
            Self {
                store,
                network,
                interceptor,
            }
        }

        async fn generation(&self) -> Arc<dyn Generation> {
            self.store
                .open(&GenerationName::new("prefix", "v1"))
                .await
                .unwrap()
        }

        async fn seed(&self, path: &str, body: &str) {
            self.generation()
                .await
                .put(&Request::get(url(path)).key(), &Response::new(200, body))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let fx = Fixture::new().await;
        fx.seed("/style.css", "cached css").await;
        fx.network
            .respond(url("/style.css").as_str(), Response::new(200, "fresh css"));

        let outcome = fx.interceptor.handle(&Request::get(url("/style.css"))).await.unwrap();

        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().body, b"cached css");
        assert_eq!(fx.network.call_count(), 0);
    }

    #[tokio::test]
    async fn miss_stores_200() {
        let fx = Fixture::new().await;
        let served = Response::new(200, "console.log(1)")
            .with_header("Content-Type", "text/javascript");
        fx.network.respond(url("/app.js").as_str(), served.clone());

        let outcome = fx.interceptor.handle(&Request::get(url("/app.js"))).await.unwrap();
        fx.interceptor.settle().await;

        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        let stored = fx
            .generation()
            .await
            .lookup(&Request::get(url("/app.js")).key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, outcome.response().unwrap().status);
        assert_eq!(stored.body, outcome.response().unwrap().body);
        assert_eq!(fx.interceptor.pending_writes(), 0);

        // Second request is now served from the store
        fx.interceptor.handle(&Request::get(url("/app.js"))).await.unwrap();
        assert_eq!(fx.network.call_count(), 1);
    }

    #[tokio::test]
    async fn non_200_is_returned_not_stored() {
        let fx = Fixture::new().await;

        let outcome = fx.interceptor.handle(&Request::get(url("/nope"))).await.unwrap();
        fx.interceptor.settle().await;

        assert_eq!(outcome.response().unwrap().status, 404);
        let stored = fx
            .generation()
            .await
            .lookup(&Request::get(url("/nope")).key())
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn other_success_statuses_are_not_stored() {
        let fx = Fixture::new().await;
        fx.network
            .respond(url("/empty").as_str(), Response::new(204, ""));

        let outcome = fx.interceptor.handle(&Request::get(url("/empty"))).await.unwrap();
        fx.interceptor.settle().await;

        assert_eq!(outcome.response().unwrap().status, 204);
        assert!(fx.generation().await.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_passes_through() {
        let fx = Fixture::new().await;
        fx.seed("/api", "cached").await;

        let request = Request::get(url("/api")).with_method(Method::Post);
        let outcome = fx.interceptor.handle(&request).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Passthrough);
        assert_eq!(fx.network.call_count(), 0);
        assert_eq!(fx.generation().await.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_navigation_serves_fallback() {
        let fx = Fixture::new().await;
        fx.seed("/index.html", "<html>shell</html>").await;
        fx.network.set_offline(true);

        let outcome = fx
            .interceptor
            .handle(&Request::navigate(url("/projects/42")))
            .await
            .unwrap();

        assert_eq!(outcome.source(), Some(ResponseSource::OfflineFallback));
        assert_eq!(outcome.response().unwrap().body, b"<html>shell</html>");
    }

    #[tokio::test]
    async fn offline_navigation_without_fallback_fails() {
        let fx = Fixture::new().await;
        fx.network.set_offline(true);

        let err = fx
            .interceptor
            .handle(&Request::navigate(url("/")))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn offline_subresource_fails() {
        let fx = Fixture::new().await;
        fx.seed("/index.html", "<html>shell</html>").await;
        fx.network.set_offline(true);

        let err = fx
            .interceptor
            .handle(&Request::get(url("/logo.png")))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn concurrent_misses_both_fetch() {
        let fx = Fixture::new().await;
        fx.network
            .respond(url("/data.json").as_str(), Response::new(200, "{}"));

        let request = Request::get(url("/data.json"));
        let (a, b) = tokio::join!(
            fx.interceptor.handle(&request),
            fx.interceptor.handle(&request)
        );
        fx.interceptor.settle().await;

        assert_eq!(a.unwrap().source(), Some(ResponseSource::Network));
        assert_eq!(b.unwrap().source(), Some(ResponseSource::Network));
        assert_eq!(fx.network.call_count(), 2);
        assert_eq!(fx.generation().await.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_generation_is_not_recreated() {
        let fx = Fixture::new().await;
        fx.seed("/app.js", "old").await;
        fx.network
            .respond(url("/app.js").as_str(), Response::new(200, "new"));
        fx.store
            .delete(&GenerationName::new("prefix", "v1"))
            .await
            .unwrap();

        let outcome = fx.interceptor.handle(&Request::get(url("/app.js"))).await.unwrap();
        fx.interceptor.settle().await;

        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert!(fx.store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_back_outlives_interceptor() {
        let fx = Fixture::new().await;
        fx.network
            .respond(url("/late.js").as_str(), Response::new(200, "late"));
        let key = Request::get(url("/late.js")).key();

        fx.interceptor.handle(&Request::get(url("/late.js"))).await.unwrap();
        let Fixture { store, interceptor, .. } = fx;
        drop(interceptor);

        let generation = store
            .get(&GenerationName::new("prefix", "v1"))
            .await
            .unwrap()
            .unwrap();
        let mut stored = None;
        for _ in 0..100 {
            stored = generation.lookup(&key).await.unwrap();
            if stored.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(stored.unwrap().body, b"late");
    }
}
