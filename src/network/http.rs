//! HTTP transport backed by ureq

use super::Network;
use crate::config::schema::NetworkConfig;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::ResponseExt;

/// Largest response body read into memory
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Real network access over HTTP(S)
pub struct HttpNetwork {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpNetwork {
    /// Create a client from network settings
    pub fn new(config: &NetworkConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

fn fetch_blocking(
    agent: &ureq::Agent,
    user_agent: &str,
    request: &Request,
) -> ShellCacheResult<Response> {
    let url = request.url.as_str();

    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(url)
        .header("User-Agent", user_agent);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let http_request = builder
        .body(())
        .map_err(|e| ShellCacheError::network(url, e.to_string()))?;

    let mut http_response = agent
        .run(http_request)
        .map_err(|e| ShellCacheError::network(url, e.to_string()))?;

    let status = http_response.status();
    let final_url = http_response.get_uri().to_string();
    let headers = http_response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = http_response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| ShellCacheError::network(url, format!("reading body: {e}")))?;

    debug!("{} {} -> {} ({})", request.method, url, status.as_u16(), final_url);

    Ok(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
        url: Some(final_url),
    })
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &user_agent, &request))
            .await
            .map_err(|e| ShellCacheError::Internal(format!("fetch task failed: {e}")))?
    }
}
