//! Command-line arguments.
//!
//! The CLI only gathers inputs; it turns them into a `PipelineConfig` and a
//! ref and hands both to the pipeline.
use crate::config::{BuildOptions, PipelineConfig, DEFAULT_REF};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "build-emacs",
    version,
    about = "Build and archive Emacs.app from an emacs-mirror revision",
    after_help = "Examples:\n  build-emacs\n  build-emacs emacs-27 --srgb\n  build-emacs emacs-24.4 --srgb-24-4\n  build-emacs master --patch-url https://example.com/fix.diff"
)]
pub struct Args {
    /// Branch, tag or commit to build
    #[arg(value_name = "REF", default_value = DEFAULT_REF)]
    pub reference: String,

    /// Render colors in the sRGB color space
    #[arg(long)]
    pub srgb: bool,

    /// sRGB color fix for the 24.4 source layout (with --srgb, both call sites must exist)
    #[arg(long = "srgb-24-4")]
    pub srgb_24_4: bool,

    /// Download a unified diff and apply it to the fresh source tree (repeatable)
    #[arg(long = "patch-url", value_name = "URL")]
    pub patch_urls: Vec<String>,

    /// Directory holding tarballs/, sources/ and builds/ (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

impl Args {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            enable_srgb_patch: self.srgb,
            enable_srgb_244_patch: self.srgb_24_4,
            patch_urls: self.patch_urls.clone(),
        }
    }

    /// Resolve the working root and assemble the run configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("determine current directory")?,
        };
        PipelineConfig::new(&root, self.build_options())
    }
}
