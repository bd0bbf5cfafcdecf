//! shellcache - offline app-shell cache
//!
//! Precaches an application's shell into a versioned generation of a
//! response store, cuts over atomically on upgrade, and answers GET
//! requests cache-first with a background refill from the network.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod manifest;
pub mod network;
pub mod store;

pub use agent::{Agent, Event, EventOutcome};
pub use error::{ShellCacheError, ShellCacheResult};
pub use interceptor::{FetchOutcome, ResponseSource};
pub use lifecycle::{ActivationReport, AgentState};
