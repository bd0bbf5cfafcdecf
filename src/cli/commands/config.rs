//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{ShellCacheError, ShellCacheResult};
use console::style;
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> ShellCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> ShellCacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellCacheResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> ShellCacheResult<()> {
    let mut config = config.clone();
    apply(&mut config, key, value)?;

    manager.save(&config).await?;
    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}

/// Apply a dot-separated key to a configuration
fn apply(config: &mut Config, key: &str, value: &str) -> ShellCacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(ShellCacheError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },

        ["agent", "namespace"] => config.agent.namespace = non_empty(key, value)?,
        ["agent", "version"] => config.agent.version = non_empty(key, value)?,
        ["agent", "scope"] => config.agent.scope = value.to_string(),
        ["agent", "offline_fallback"] => config.agent.offline_fallback = value.to_string(),
        ["agent", "manifest"] => {
            config.agent.manifest = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        ["network", "timeout_secs"] => {
            config.network.timeout_secs = value
                .parse()
                .map_err(|_| ShellCacheError::User(format!("Invalid number: {}", value)))?
        }
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        ["store", "dir"] => config.store.dir = Some(PathBuf::from(value)),

        _ => {
            return Err(ShellCacheError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

const VALID_KEYS: [&str; 9] = [
    "general.log_format",
    "agent.namespace",
    "agent.version",
    "agent.scope",
    "agent.manifest",
    "agent.offline_fallback",
    "network.timeout_secs",
    "network.user_agent",
    "store.dir",
];

fn non_empty(key: &str, value: &str) -> ShellCacheResult<String> {
    if value.trim().is_empty() {
        return Err(ShellCacheError::User(format!("{} must not be empty", key)));
    }
    Ok(value.to_string())
}
