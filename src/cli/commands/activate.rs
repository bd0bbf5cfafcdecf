//! Activate command - cut over to the current generation

use super::{print_activation, Harness};
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use console::style;

/// Execute the activate command
pub async fn execute(config: &Config) -> ShellCacheResult<()> {
    let harness = Harness::new(config)?;
    let agent = &harness.agent;

    if !agent.restore().await? {
        return Err(ShellCacheError::GenerationNotFound(
            agent.generation().to_string(),
        ));
    }

    let report = agent.activate().await?;
    print_activation(&report);
    if report.deleted.is_empty() && report.failed.is_empty() {
        println!("No stale generations.");
    }
    println!("{} Active {}", style("✓").green(), agent.generation());
    Ok(())
}
