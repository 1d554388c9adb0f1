//! Structured subprocess invocation.
//!
//! Every external tool (tar, patch, autoconf, make) runs through a
//! `CommandRunner`, which hands back the exit status and captured output so
//! each call site decides whether a non-zero status is fatal.
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-quoted rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        shell_words::join(words)
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// First non-empty stderr line, for short diagnostics.
    pub fn stderr_line(&self) -> &str {
        first_line(&self.stderr)
    }

    /// Short diagnostic: stderr if the tool wrote any, else the last stdout line.
    pub fn diagnostic(&self) -> &str {
        let line = self.stderr_line();
        if !line.is_empty() {
            return line;
        }
        self.stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or_default()
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

/// Runs external commands to completion.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome>;
}

/// Runs commands on the host, resolving programs through `PATH`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        let program = resolve_program(&spec.program, &spec.cwd)?;
        tracing::debug!(command = %spec.display(), cwd = %spec.cwd.display(), "run");

        let start = Instant::now();
        let output = Command::new(&program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .output()
            .with_context(|| format!("run {}", spec.display()))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            elapsed_ms,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            program = %spec.program,
            "command complete"
        );

        Ok(CommandOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Programs with a path component (`./configure`) are taken relative to the
/// working directory and made absolute; bare names are looked up on `PATH`.
fn resolve_program(program: &str, cwd: &Path) -> Result<PathBuf> {
    if program.contains('/') {
        let joined = cwd.join(program);
        return std::path::absolute(&joined)
            .with_context(|| format!("resolve {}", joined.display()));
    }
    which::which(program).with_context(|| format!("required tool `{program}` not found on PATH"))
}

/// Log a tolerated non-zero exit without failing the stage.
pub fn warn_on_failure(spec: &CommandSpec, outcome: &CommandOutcome) {
    if outcome.success() {
        return;
    }
    tracing::warn!(
        command = %spec.display(),
        status = ?outcome.code,
        detail = outcome.diagnostic(),
        "command exited unsuccessfully"
    );
}
