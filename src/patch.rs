//! Patch Engine: source-level fixes applied to a freshly extracted tree.
//!
//! Two kinds of patch exist. Literal replacements swap one exact byte
//! sequence for another in a single file; remote diffs are downloaded into
//! `<tree>/patches/` and applied with `patch -p1`.
use crate::config::BuildOptions;
use crate::error::PipelineError;
use crate::exec::{CommandRunner, CommandSpec};
use crate::transport::Transport;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const NSTERM: &str = "src/nsterm.m";

const SRGB_SEARCH: &str = "*col = [NSColor colorWithCalibratedRed: r green: g blue: b alpha: 1.0];";
const SRGB_REPLACE: &str = "*col = [NSColor colorWithDeviceRed: r green: g blue: b alpha: 1.0];";

const SRGB_244_SEARCH: &str =
    "return [NSColor colorWithCalibratedRed: r green: g blue: b alpha: 1.0];";
const SRGB_244_REPLACE: &str =
    "return [NSColor colorWithDeviceRed: r green: g blue: b alpha: 1.0];";

/// Highest sequence number a downloaded diff can take.
const MAX_PATCH_INDEX: u32 = 999;

/// One patch to apply to a source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSpec {
    /// Download a unified diff and apply it with strip level 1.
    RemoteDiff { url: String },
    /// Replace every occurrence of `search` with `replacement` in `file`.
    LiteralReplace {
        file: PathBuf,
        search: String,
        replacement: String,
    },
}

impl PatchSpec {
    fn literal(file: &str, search: &str, replacement: &str) -> Self {
        PatchSpec::LiteralReplace {
            file: PathBuf::from(file),
            search: search.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Ordered patch list for a set of build options.
pub fn patch_specs(options: &BuildOptions) -> Vec<PatchSpec> {
    let mut specs = Vec::new();
    if options.enable_srgb_patch {
        specs.push(PatchSpec::literal(NSTERM, SRGB_SEARCH, SRGB_REPLACE));
    }
    if options.enable_srgb_244_patch {
        specs.push(PatchSpec::literal(NSTERM, SRGB_244_SEARCH, SRGB_244_REPLACE));
    }
    specs.extend(
        options
            .patch_urls
            .iter()
            .map(|url| PatchSpec::RemoteDiff { url: url.clone() }),
    );
    specs
}

/// Replace every non-overlapping occurrence of `search`, scanning left to right.
///
/// Returns the new content and the number of replacements made. An empty
/// `search` matches nothing.
pub fn replace_literal(content: &[u8], search: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
    if search.is_empty() || search.len() > content.len() {
        return (content.to_vec(), 0);
    }
    let mut out = Vec::with_capacity(content.len());
    let mut count = 0;
    let mut pos = 0;
    while pos < content.len() {
        if content[pos..].starts_with(search) {
            out.extend_from_slice(replacement);
            pos += search.len();
            count += 1;
        } else {
            out.push(content[pos]);
            pos += 1;
        }
    }
    (out, count)
}

/// Tools the engine needs to apply patches.
pub struct PatchContext<'a> {
    pub transport: &'a dyn Transport,
    pub runner: &'a dyn CommandRunner,
}

/// Apply a single patch to `tree`.
pub fn apply(ctx: &PatchContext<'_>, spec: &PatchSpec, tree: &Path) -> Result<()> {
    match spec {
        PatchSpec::RemoteDiff { url } => apply_remote_diff(ctx, url, tree),
        PatchSpec::LiteralReplace {
            file,
            search,
            replacement,
        } => apply_literal(&tree.join(file), search, replacement),
    }
}

/// Apply patches in order, stopping at the first failure.
pub fn apply_all(ctx: &PatchContext<'_>, specs: &[PatchSpec], tree: &Path) -> Result<()> {
    for spec in specs {
        apply(ctx, spec, tree)?;
    }
    Ok(())
}

fn apply_literal(path: &Path, search: &str, replacement: &str) -> Result<()> {
    if !path.is_file() {
        return Err(PipelineError::PatchTargetMissing {
            path: path.to_path_buf(),
        }
        .into());
    }
    let content = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let (patched, count) = replace_literal(&content, search.as_bytes(), replacement.as_bytes());
    if count == 0 {
        return Err(PipelineError::PatchNoMatch {
            path: path.to_path_buf(),
        }
        .into());
    }
    fs::write(path, patched).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), count, "applied literal patch");
    Ok(())
}

fn apply_remote_diff(ctx: &PatchContext<'_>, url: &str, tree: &Path) -> Result<()> {
    let patches_dir = tree.join("patches");
    fs::create_dir_all(&patches_dir)
        .with_context(|| format!("create {}", patches_dir.display()))?;
    let patch_file = next_patch_path(&patches_dir, Path::exists)?;

    tracing::info!(url, path = %patch_file.display(), "downloading patch");
    ctx.transport
        .download(url, &patch_file)
        .with_context(|| format!("download patch {url}"))?;

    let spec = CommandSpec::new("patch", tree)
        .args(["-f", "-p1", "-i"])
        .arg(&patch_file);
    let outcome = ctx.runner.run(&spec)?;
    if !outcome.success() {
        tracing::warn!(
            command = %spec.display(),
            detail = outcome.diagnostic(),
            "patch rejected"
        );
        return Err(PipelineError::PatchApply {
            patch: patch_file,
            tree: tree.to_path_buf(),
            status: outcome.code,
        }
        .into());
    }
    tracing::info!(path = %patch_file.display(), "applied remote patch");
    Ok(())
}

/// First unused `patch-NNN.diff` in `dir`, counting up from 1.
pub fn next_patch_path<F>(dir: &Path, exists: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    (1..=MAX_PATCH_INDEX)
        .map(|index| dir.join(format!("patch-{index:03}.diff")))
        .find(|candidate| !exists(candidate))
        .with_context(|| format!("no free patch slot in {}", dir.display()))
}
