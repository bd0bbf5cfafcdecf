//! Network access for the agent
//!
//! The agent never talks to the transport directly; it goes through the
//! [`Network`] trait so the real HTTP client can be swapped for a scripted
//! one:
//! - `HttpNetwork`: blocking `ureq` client run on tokio's blocking pool
//! - `ScriptedNetwork`: canned responses and failures, with a call log

mod http;
mod scripted;

pub use http::HttpNetwork;
pub use scripted::ScriptedNetwork;

use crate::error::ShellCacheResult;
use crate::http::{Request, Response};
use async_trait::async_trait;

/// Transport used for every network round-trip
///
/// Returns `Ok` for any HTTP status; `Err` means no response was
/// obtainable (offline, DNS failure, refused connection).
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response>;
}
