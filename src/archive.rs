//! Archiver: compress a finished bundle into a dated, revision-tagged file.
use crate::config::{PathsConfig, Upstream};
use crate::exec::{warn_on_failure, CommandRunner, CommandSpec};
use crate::revision::short_identifier;
use crate::stage::{plan, StageState};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Archive file name, e.g. `Emacs.app-2020-03-01-(abcdef1).tbz`.
pub fn archive_name(upstream: &Upstream, identifier: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}-({}).tbz",
        upstream.bundle_name(),
        date.format("%Y-%m-%d"),
        short_identifier(identifier)
    )
}

/// Compress `bundle` into the builds directory unless the archive exists.
///
/// Entries are stored relative to the bundle's parent, so the archive
/// unpacks to a single top-level `<App>.app` directory.
pub fn archive_bundle(
    runner: &dyn CommandRunner,
    paths: &PathsConfig,
    upstream: &Upstream,
    bundle: &Path,
    identifier: &str,
    date: NaiveDate,
) -> Result<PathBuf> {
    let target = match plan(paths.builds_dir().join(archive_name(upstream, identifier, date))) {
        StageState::Satisfied(path) => {
            tracing::info!(archive = %path.display(), "archive exists, skipping");
            return Ok(path);
        }
        StageState::Pending(path) => path,
    };

    let parent = bundle
        .parent()
        .ok_or_else(|| anyhow!("bundle {} has no parent directory", bundle.display()))?;
    let name = bundle
        .file_name()
        .ok_or_else(|| anyhow!("bundle {} has no file name", bundle.display()))?;

    tracing::info!(archive = %target.display(), "creating archive");
    let spec = CommandSpec::new("tar", parent)
        .arg("-cjf")
        .arg(&target)
        .arg(name);
    let outcome = runner.run(&spec)?;
    warn_on_failure(&spec, &outcome);
    Ok(target)
}
