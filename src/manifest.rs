//! Precache manifest
//!
//! The ordered list of URLs that must be present in a generation right
//! after install. Entries are resolved against the agent scope once, at
//! construction, and never change afterwards.

use crate::error::ShellCacheResult;
use crate::http::resolve_url;
use url::Url;

/// Resolved, de-duplicated precache manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    urls: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve raw manifest entries against `scope`
    ///
    /// Keeps the first occurrence of each URL, in manifest order. URLs that
    /// only differ by fragment are the same entry.
    pub fn resolve<S: AsRef<str>>(scope: &Url, entries: &[S]) -> ShellCacheResult<Self> {
        let mut urls: Vec<Url> = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut url = resolve_url(scope, entry.as_ref())?;
            url.set_fragment(None);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(Self { urls })
    }

    /// Resolved URLs in manifest order
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
