//! Run configuration threaded through every pipeline stage.
//!
//! Everything a stage needs to name its inputs and outputs lives here, built
//! once in `main` and passed down by reference.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Branch resolved when no ref is given on the command line.
pub const DEFAULT_REF: &str = "master";

/// Where sources come from and what the build produces.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Base URL of the repository-hosting API.
    pub api_base: String,
    /// Host serving revision snapshots.
    pub archive_host: String,
    /// `owner/name` of the mirror repository.
    pub repo: String,
    /// Name of the application bundle, without the `.app` suffix.
    pub app_name: String,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            archive_host: "https://github.com".to_string(),
            repo: "emacs-mirror/emacs".to_string(),
            app_name: "Emacs".to_string(),
        }
    }
}

impl Upstream {
    /// Prefix shared by snapshot tarballs and the trees they unpack to.
    pub fn snapshot_prefix(&self) -> String {
        self.repo.replace('/', "-")
    }

    /// Bundle directory name, e.g. `Emacs.app`.
    pub fn bundle_name(&self) -> String {
        format!("{}.app", self.app_name)
    }
}

/// Working directories under a single root.
///
/// The directories form a persistent cache: they are created on demand and
/// never cleaned up, so later runs can skip work whose output already exists.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    root: PathBuf,
}

impl PathsConfig {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded snapshot archives.
    pub fn tarballs_dir(&self) -> PathBuf {
        self.root.join("tarballs")
    }

    /// Extracted (and patched) source trees.
    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    /// Finished, compressed bundles.
    pub fn builds_dir(&self) -> PathBuf {
        self.root.join("builds")
    }

    /// Create every working directory that does not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.tarballs_dir(),
            self.sources_dir(),
            self.builds_dir(),
        ] {
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Compatibility switches chosen on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub enable_srgb_patch: bool,
    pub enable_srgb_244_patch: bool,
    /// Extra unified diffs to download and apply, in order.
    pub patch_urls: Vec<String>,
}

/// Immutable inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub upstream: Upstream,
    pub options: BuildOptions,
}

impl PipelineConfig {
    /// Anchor `root` to the current directory and assemble the run inputs.
    ///
    /// Tools run with their working directory set inside the root while
    /// receiving paths built from it, so the root must be absolute.
    pub fn new(root: &Path, options: BuildOptions) -> Result<Self> {
        let root = std::path::absolute(root)
            .with_context(|| format!("resolve working root {}", root.display()))?;
        Ok(Self {
            paths: PathsConfig::new(root),
            upstream: Upstream::default(),
            options,
        })
    }
}
