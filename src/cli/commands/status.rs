//! Status command - show agent and store status

use super::Harness;
use crate::config::{Config, ConfigManager};
use crate::error::ShellCacheResult;
use crate::store::ResponseStore;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[MISSING] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> ShellCacheResult<()> {
    let harness = Harness::new(config)?;
    let agent = &harness.agent;
    let current = agent.generation();

    println!("{}", style("shellcache status").bold().cyan());
    println!();

    println!("{}", style("Agent:").bold());
    println!("  Generation: {}", current);
    println!("  Scope:      {}", agent.scope());
    println!("  Manifest:   {} entries", agent.manifest().len());
    println!("  Fallback:   {}", config.agent.offline_fallback);
    println!();

    println!("{}", style("Store:").bold());
    println!(
        "  {} at {}",
        harness.store.store_name(),
        ConfigManager::store_dir(config).display()
    );

    let generations = harness.store.generations().await?;
    if let Some(generation) = harness.store.get(current).await? {
        let entries = generation.keys().await?.len();
        println!("  {}{} installed ({} entries)", CHECK, current, entries);
    } else {
        println!(
            "  {}{} not installed. Run: shellcache install",
            CROSS, current
        );
    }

    let stale: Vec<_> = generations
        .iter()
        .filter(|name| name.belongs_to(&current.namespace) && *name != current)
        .collect();
    if !stale.is_empty() {
        println!(
            "  {}{} stale generation(s) pending cleanup. Run: shellcache activate",
            WARN,
            stale.len()
        );
    }

    Ok(())
}
