//! HTTP access for the resolver, fetcher and remote patches.
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

const USER_AGENT: &str = concat!("emacs-builder/", env!("CARGO_PKG_VERSION"));

/// Network operations the pipeline performs.
pub trait Transport {
    /// GET a URL with the given query parameters and decode the body as JSON.
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value>;

    /// GET a URL and store the body at `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP client backed by `ureq`.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!(url, ?query, "http get json");
        let mut request = ureq::get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = request.call().with_context(|| format!("GET {url}"))?;
        let value: Value = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode JSON from {url}"))?;
        Ok(value)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::debug!(url, dest = %dest.display(), "http download");
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("download target {} has no parent", dest.display()))?;
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

        let response = ureq::get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("GET {url}"))?;

        // Stream into a sibling temp file so an interrupted run never leaves
        // a partial file under the final name.
        let mut staged = NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        let mut reader = response.into_body().into_reader();
        let bytes = io::copy(&mut reader, staged.as_file_mut())
            .with_context(|| format!("write body of {url}"))?;
        staged
            .persist(dest)
            .map_err(|err| err.error)
            .with_context(|| format!("persist {}", dest.display()))?;

        tracing::debug!(bytes, dest = %dest.display(), "download complete");
        Ok(())
    }
}
