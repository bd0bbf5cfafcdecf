//! CLI command implementations

pub mod activate;
pub mod config;
pub mod fetch;
pub mod generations;
pub mod install;
pub mod status;

pub use activate::execute as activate;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use generations::execute as generations;
pub use install::execute as install;
pub use status::execute as status;

use crate::agent::Agent;
use crate::config::{Config, ConfigManager};
use crate::error::ShellCacheResult;
use crate::host::RecordingHost;
use crate::lifecycle::ActivationReport;
use crate::network::HttpNetwork;
use crate::store::DiskStore;
use console::style;
use std::sync::Arc;

/// Agent wired to the on-disk store and the HTTP network
pub(crate) struct Harness {
    pub agent: Agent,
    pub store: Arc<DiskStore>,
    pub network: Arc<HttpNetwork>,
}

impl Harness {
    pub fn new(config: &Config) -> ShellCacheResult<Self> {
        let store = Arc::new(DiskStore::new(ConfigManager::store_dir(config)));
        let network = Arc::new(HttpNetwork::new(&config.network));
        let agent = Agent::from_config(
            &config.agent,
            store.clone(),
            network.clone(),
            Arc::new(RecordingHost::new()),
        )?;
        Ok(Self {
            agent,
            store,
            network,
        })
    }
}

/// Print what an activation did
pub(crate) fn print_activation(report: &ActivationReport) {
    for name in &report.deleted {
        println!("  {} deleted {}", style("-").red(), name);
    }
    for (name, reason) in &report.failed {
        println!(
            "  {} could not delete {}: {}",
            style("!").yellow(),
            name,
            reason
        );
    }
}
