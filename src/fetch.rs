//! Archive Fetcher: download the source snapshot for a revision.
use crate::config::{PathsConfig, Upstream};
use crate::error::PipelineError;
use crate::revision::short_identifier;
use crate::stage::{plan, StageState};
use crate::transport::Transport;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// File name of the snapshot tarball for a revision.
pub fn tarball_name(upstream: &Upstream, identifier: &str) -> String {
    format!(
        "{}-{}.tgz",
        upstream.snapshot_prefix(),
        short_identifier(identifier)
    )
}

/// Where the snapshot for a revision is cached.
pub fn tarball_path(paths: &PathsConfig, upstream: &Upstream, identifier: &str) -> PathBuf {
    paths.tarballs_dir().join(tarball_name(upstream, identifier))
}

/// Snapshot download URL for a full revision hash.
pub fn tarball_url(upstream: &Upstream, identifier: &str) -> String {
    format!(
        "{}/{}/tarball/{}",
        upstream.archive_host.trim_end_matches('/'),
        upstream.repo,
        identifier
    )
}

/// Return the cached snapshot for `identifier`, downloading it if absent.
pub fn fetch_tarball(
    transport: &dyn Transport,
    paths: &PathsConfig,
    upstream: &Upstream,
    identifier: &str,
) -> Result<PathBuf> {
    let target = match plan(tarball_path(paths, upstream, identifier)) {
        StageState::Satisfied(path) => {
            tracing::info!(path = %path.display(), "tarball exists, skipping download");
            return Ok(path);
        }
        StageState::Pending(path) => path,
    };

    let url = tarball_url(upstream, identifier);
    tracing::info!(%url, "downloading tarball");
    if let Err(err) = transport.download(&url, &target) {
        return Err(err.context(download_error(&url, &target)));
    }
    if !target.is_file() {
        return Err(download_error(&url, &target).into());
    }
    Ok(target)
}

fn download_error(url: &str, target: &Path) -> PipelineError {
    PipelineError::Download {
        url: url.to_string(),
        path: target.to_path_buf(),
    }
}
