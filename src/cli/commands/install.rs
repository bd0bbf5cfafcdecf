//! Install command - precache the manifest

use super::{print_activation, Harness};
use crate::agent::Event;
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::ShellCacheResult;
use console::style;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> ShellCacheResult<()> {
    let harness = Harness::new(config)?;
    let agent = &harness.agent;

    println!(
        "Installing {} ({} manifest entries)",
        style(agent.generation()).bold(),
        agent.manifest().len()
    );
    agent.dispatch(Event::Install).await?;
    println!("{} Installed {}", style("✓").green(), agent.generation());

    // Install signals skip-waiting, so activation follows right away
    if args.no_activate {
        return Ok(());
    }

    let report = agent.activate().await?;
    print_activation(&report);
    println!("{} Active {}", style("✓").green(), agent.generation());
    Ok(())
}
