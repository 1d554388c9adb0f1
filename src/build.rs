//! Builder: autoconf/make build of the NextStep application bundle.
use crate::config::Upstream;
use crate::error::PipelineError;
use crate::exec::{warn_on_failure, CommandRunner, CommandSpec};
use crate::stage::{plan, StageState};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Bootstrap scripts in order of preference.
const BOOTSTRAP_SCRIPTS: [&str; 2] = ["autogen/copy_autogen", "autogen.sh"];

/// Window-system flag passed to configure.
const CONFIGURE_FLAG: &str = "--with-ns";

/// Bundle produced by `make install` inside a source tree.
pub fn bundle_path(upstream: &Upstream, tree: &Path) -> PathBuf {
    tree.join("nextstep").join(upstream.bundle_name())
}

/// The bootstrap script to run, if the tree ships one.
pub fn bootstrap_script<F>(tree: &Path, exists: F) -> Option<&'static str>
where
    F: Fn(&Path) -> bool,
{
    BOOTSTRAP_SCRIPTS
        .into_iter()
        .find(|script| exists(&tree.join(script)))
}

/// Command sequence that builds and installs the bundle.
pub fn build_steps(tree: &Path, bootstrap: Option<&str>) -> Vec<CommandSpec> {
    let mut steps = Vec::new();
    if let Some(script) = bootstrap {
        steps.push(CommandSpec::new(format!("./{script}"), tree));
    }
    steps.push(CommandSpec::new("./configure", tree).arg(CONFIGURE_FLAG));
    steps.push(CommandSpec::new("make", tree));
    steps.push(CommandSpec::new("make", tree).arg("install"));
    steps
}

/// Build the bundle for `tree` unless it already exists.
///
/// Individual step failures are logged but not fatal; the bundle on disk
/// decides whether the build succeeded.
pub fn build_bundle(runner: &dyn CommandRunner, upstream: &Upstream, tree: &Path) -> Result<PathBuf> {
    let bundle = match plan(bundle_path(upstream, tree)) {
        StageState::Satisfied(path) => {
            tracing::info!(bundle = %path.display(), "bundle exists, skipping build");
            return Ok(path);
        }
        StageState::Pending(path) => path,
    };

    let bootstrap = bootstrap_script(tree, Path::exists);
    if bootstrap.is_none() {
        tracing::debug!(tree = %tree.display(), "no bootstrap script found");
    }

    let mut last_status = Some(0);
    for step in build_steps(tree, bootstrap) {
        tracing::info!(command = %step.display(), "build step");
        let outcome = runner.run(&step)?;
        warn_on_failure(&step, &outcome);
        last_status = outcome.code;
    }

    if !bundle.is_dir() {
        return Err(PipelineError::Build {
            bundle,
            status: last_status,
        }
        .into());
    }
    tracing::info!(bundle = %bundle.display(), "build complete");
    Ok(bundle)
}
