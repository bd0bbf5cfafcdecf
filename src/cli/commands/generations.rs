//! Generations command - list generations in the store

use super::Harness;
use crate::cli::args::{GenerationsArgs, OutputFormat};
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::store::{GenerationName, ResponseStore};
use console::style;
use std::fmt;

/// How a generation relates to the configured agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// The configured version
    Current,
    /// Same namespace, other version; removed on next activate
    Stale,
    /// Owned by another namespace; never touched
    Foreign,
}

impl Role {
    fn of(name: &GenerationName, current: &GenerationName) -> Self {
        if name == current {
            Self::Current
        } else if name.belongs_to(&current.namespace) {
            Self::Stale
        } else {
            Self::Foreign
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Stale => write!(f, "stale"),
            Self::Foreign => write!(f, "foreign"),
        }
    }
}

struct Row {
    name: GenerationName,
    role: Role,
    entries: usize,
}

/// Execute the generations command
pub async fn execute(args: GenerationsArgs, config: &Config) -> ShellCacheResult<()> {
    let harness = Harness::new(config)?;
    let current = harness.agent.generation();

    let mut rows = vec![];
    for name in harness.store.generations().await? {
        let entries = match harness.store.get(&name).await? {
            Some(generation) => generation.keys().await?.len(),
            None => continue,
        };
        rows.push(Row {
            role: Role::of(&name, current),
            name,
            entries,
        });
    }

    if rows.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No generations in {}", harness.store.root().display()),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Plain => print_plain(&rows),
    }

    Ok(())
}

fn print_table(rows: &[Row]) {
    println!(
        "{:<40} {:<10} {:<8}",
        style("GENERATION").bold(),
        style("ROLE").bold(),
        style("ENTRIES").bold()
    );
    println!("{}", "-".repeat(60));

    for row in rows {
        let role = match row.role {
            Role::Current => style("current").green(),
            Role::Stale => style("stale").yellow(),
            Role::Foreign => style("foreign").dim(),
        };
        println!("{:<40} {:<10} {:<8}", row.name, role, row.entries);
    }

    println!();
    println!("Total: {} generation(s)", rows.len());
}

fn print_json(rows: &[Row]) -> ShellCacheResult<()> {
    #[derive(serde::Serialize)]
    struct GenerationJson {
        name: String,
        namespace: String,
        version: String,
        role: String,
        entries: usize,
    }

    let json_rows: Vec<GenerationJson> = rows
        .iter()
        .map(|r| GenerationJson {
            name: r.name.to_string(),
            namespace: r.name.namespace.clone(),
            version: r.name.version.clone(),
            role: r.role.to_string(),
            entries: r.entries,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_rows)?);
    Ok(())
}

fn print_plain(rows: &[Row]) {
    for row in rows {
        println!("{}", row.name);
    }
}
