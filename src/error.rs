//! Pipeline error kinds.
//!
//! Stages return `anyhow::Result` so I/O failures keep their context chain;
//! post-condition failures are raised as a `PipelineError` inside that chain
//! so callers can tell them apart with `downcast_ref`.
use std::path::PathBuf;
use thiserror::Error;

/// A stage failed to produce (or validate) its expected output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The commit listing could not be fetched or did not have the expected shape.
    #[error("failed to resolve ref '{reference}': {message}")]
    Resolution { reference: String, message: String },

    /// The snapshot download did not leave a file at the expected path.
    #[error("download of {url} did not produce {}", .path.display())]
    Download { url: String, path: PathBuf },

    /// Unpacking did not produce the expected source tree.
    #[error("extraction of {} did not produce {}{}", .tarball.display(), .dir.display(), status_suffix(.status))]
    Extraction {
        tarball: PathBuf,
        dir: PathBuf,
        status: Option<i32>,
    },

    /// A literal-replace patch names a file that is not in the source tree.
    #[error("patch target {} does not exist", .path.display())]
    PatchTargetMissing { path: PathBuf },

    /// A literal-replace patch found no occurrence of its search text.
    #[error("patch search text not found in {}", .path.display())]
    PatchNoMatch { path: PathBuf },

    /// The external patch tool rejected a downloaded diff.
    #[error("failed to apply {} to {}{}", .patch.display(), .tree.display(), status_suffix(.status))]
    PatchApply {
        patch: PathBuf,
        tree: PathBuf,
        status: Option<i32>,
    },

    /// The toolchain finished without producing the application bundle.
    #[error("build did not produce {}{}", .bundle.display(), status_suffix(.status))]
    Build {
        bundle: PathBuf,
        status: Option<i32>,
    },
}

fn status_suffix(status: &Option<i32>) -> String {
    match *status {
        Some(0) => String::new(),
        Some(code) => format!(" (last command exited with status {code})"),
        None => " (last command was terminated by a signal)".to_string(),
    }
}
