//! Source Extractor: unpack a snapshot into the source cache.
use crate::config::PathsConfig;
use crate::error::PipelineError;
use crate::exec::{warn_on_failure, CommandRunner, CommandSpec};
use crate::patch::{apply_all, PatchContext, PatchSpec};
use crate::stage::{plan, StageState};
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Source tree a tarball unpacks to: its file name minus the extension.
pub fn source_dir(paths: &PathsConfig, tarball: &Path) -> Result<PathBuf> {
    let stem = tarball
        .file_stem()
        .ok_or_else(|| anyhow!("tarball path {} has no file name", tarball.display()))?;
    Ok(paths.sources_dir().join(stem))
}

/// Unpack `tarball` unless its tree already exists, then patch fresh trees.
///
/// An existing tree is returned untouched: patches were applied when it was
/// first extracted and are never applied twice. A tree whose patches fail is
/// removed again, so only fully patched trees are ever reused.
pub fn extract_source(
    ctx: &PatchContext<'_>,
    paths: &PathsConfig,
    tarball: &Path,
    patches: &[PatchSpec],
) -> Result<PathBuf> {
    let target = match plan(source_dir(paths, tarball)?) {
        StageState::Satisfied(dir) => {
            tracing::info!(dir = %dir.display(), "source tree exists, skipping extraction");
            return Ok(dir);
        }
        StageState::Pending(dir) => dir,
    };

    tracing::info!(tarball = %tarball.display(), "extracting source");
    let spec = CommandSpec::new("tar", &paths.sources_dir())
        .arg("-xzf")
        .arg(tarball);
    let outcome = ctx.runner.run(&spec)?;
    warn_on_failure(&spec, &outcome);
    if !target.is_dir() {
        return Err(PipelineError::Extraction {
            tarball: tarball.to_path_buf(),
            dir: target,
            status: outcome.code,
        }
        .into());
    }

    if !patches.is_empty() {
        tracing::info!(count = patches.len(), "applying patches");
        if let Err(err) = apply_all(ctx, patches, &target) {
            discard_tree(&target);
            return Err(err);
        }
    }
    Ok(target)
}

fn discard_tree(dir: &Path) {
    tracing::warn!(dir = %dir.display(), "patching failed, removing source tree");
    if let Err(err) = fs::remove_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), error = %err, "could not remove source tree");
    }
}
