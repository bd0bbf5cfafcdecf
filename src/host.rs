//! Host platform signals
//!
//! The lifecycle controller tells its host when to skip the waiting
//! period after install and when to take over already-open clients after
//! activate. What the host does with those signals is its own business.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Receiver of lifecycle side effects
#[async_trait]
pub trait Host: Send + Sync {
    /// Proceed to activation without waiting for controlled clients to close
    async fn skip_waiting(&self);

    /// Start controlling every open client immediately
    async fn claim_clients(&self);
}

/// Host that counts the signals it receives
#[derive(Debug, Default)]
pub struct RecordingHost {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `skip_waiting` was signalled
    pub fn skip_waiting_count(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Times `claim_clients` was signalled
    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn skip_waiting(&self) {
        debug!("Host: skip waiting");
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        debug!("Host: claim clients");
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}
