//! Fetch command - request a URL through the agent

use super::Harness;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{Request, Response};
use crate::interceptor::FetchOutcome;
use crate::network::Network;
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShellCacheResult<()> {
    let harness = Harness::new(config)?;
    let agent = &harness.agent;

    let state = agent.start().await?;
    debug!("Agent {} is {}", agent.generation(), state);

    let url = agent.resolve(&args.url)?;
    let mut request = if args.navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    }
    .with_method(args.method);
    for (name, value) in args.headers {
        request = request.with_header(name, value);
    }

    let outcome = agent.fetch(&request).await;
    // Let the background write-back land before the process exits
    agent.settle().await;

    let (response, source) = match outcome? {
        FetchOutcome::Respond { response, source } => (response, source.to_string()),
        FetchOutcome::Passthrough => (
            harness.network.fetch(&request).await?,
            "passthrough".to_string(),
        ),
    };

    let status = if response.is_success() {
        style(response.status).green()
    } else {
        style(response.status).yellow()
    };
    eprintln!("{} {} [{}]", status, request.url, style(source).dim());

    write_response(&response, args.include)
        .map_err(|e| ShellCacheError::io("writing response to stdout", e))
}

fn write_response(response: &Response, include_head: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if include_head {
        writeln!(out, "HTTP {} {}", response.status, response.status_text)?;
        for (name, value) in &response.headers {
            writeln!(out, "{}: {}", name, value)?;
        }
        writeln!(out)?;
    }
    out.write_all(&response.body)?;
    out.flush()
}
