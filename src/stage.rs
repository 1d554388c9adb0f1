//! Skip-if-exists planning shared by every stage.
//!
//! Each stage output path is a pure function of the resolved revision, so the
//! decision to do work reduces to one existence check on that path.
use std::path::{Path, PathBuf};

/// Whether a stage must run to produce its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    /// Output already on disk; pass it downstream unchanged.
    Satisfied(PathBuf),
    /// Output missing; the stage has to produce it here.
    Pending(PathBuf),
}

/// Decide a stage's state with an injected existence predicate.
pub fn plan_with<F>(target: PathBuf, exists: F) -> StageState
where
    F: Fn(&Path) -> bool,
{
    if exists(&target) {
        StageState::Satisfied(target)
    } else {
        StageState::Pending(target)
    }
}

/// Decide a stage's state against the real filesystem.
pub fn plan(target: PathBuf) -> StageState {
    plan_with(target, Path::exists)
}
