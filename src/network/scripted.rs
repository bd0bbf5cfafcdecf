//! Scripted network for embedding and tests

use super::Network;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{Request, RequestKey, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail(String),
}

/// Network that answers from a fixed routing table
///
/// Unrouted URLs answer 404. Every call is recorded, so tests can assert
/// that a request was (or was not) sent.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: Mutex<Vec<RequestKey>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`
    pub fn respond(&self, url: &str, response: Response) -> &Self {
        self.lock_routes()
            .insert(url.to_string(), Route::Respond(response));
        self
    }

    /// Fail requests to `url` with a transport error
    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.lock_routes()
            .insert(url.to_string(), Route::Fail(reason.to_string()));
        self
    }

    /// Make every request fail as if the device were offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests seen so far, in order
    pub fn calls(&self) -> Vec<RequestKey> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of requests seen so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn lock_routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
        let key = request.key();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(ShellCacheError::network(&key.url, "offline"));
        }

        let route = self.lock_routes().get(&key.url).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(reason)) => Err(ShellCacheError::network(&key.url, reason)),
            None => Ok(Response::new(404, "Not Found")),
        }
    }
}
