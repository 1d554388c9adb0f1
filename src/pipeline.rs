//! End-to-end build: resolve, fetch, extract and patch, build, archive.
//!
//! Every stage names its output from the resolved revision and skips work
//! whose output already exists, so a rerun against an unchanged ref does no
//! downloads, extractions, builds or compression.
use crate::archive::archive_bundle;
use crate::build::build_bundle;
use crate::config::PipelineConfig;
use crate::exec::CommandRunner;
use crate::extract::extract_source;
use crate::fetch::fetch_tarball;
use crate::patch::{patch_specs, PatchContext};
use crate::revision::{resolve, RevisionInfo};
use crate::transport::Transport;
use anyhow::Result;
use std::path::PathBuf;

/// Paths produced by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub revision: RevisionInfo,
    pub tarball: PathBuf,
    pub source: PathBuf,
    pub bundle: PathBuf,
    pub archive: PathBuf,
}

/// Run every stage for `reference`, aborting on the first failure.
pub fn run(
    config: &PipelineConfig,
    transport: &dyn Transport,
    runner: &dyn CommandRunner,
    reference: &str,
) -> Result<PipelineOutput> {
    config.paths.ensure_dirs()?;
    let upstream = &config.upstream;
    tracing::info!(reference, root = %config.paths.root().display(), "starting build");

    let revision = resolve(transport, upstream, reference)?;
    let tarball = fetch_tarball(transport, &config.paths, upstream, &revision.identifier)?;

    let patches = patch_specs(&config.options);
    let ctx = PatchContext { transport, runner };
    let source = extract_source(&ctx, &config.paths, &tarball, &patches)?;

    let bundle = build_bundle(runner, upstream, &source)?;
    let archive = archive_bundle(
        runner,
        &config.paths,
        upstream,
        &bundle,
        &revision.identifier,
        revision.commit_date,
    )?;
    tracing::info!(archive = %archive.display(), "done");

    Ok(PipelineOutput {
        revision,
        tarball,
        source,
        bundle,
        archive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;
    use crate::error::PipelineError;
    use crate::exec::{CommandOutcome, CommandSpec};
    use anyhow::anyhow;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    const SHA: &str = "abcdef1234567890abcdef1234567890abcdef12";
    const NSTERM_LINE: &str = "*col = [NSColor colorWithCalibratedRed: r green: g blue: b alpha: 1.0];";

    /// Serves one commit for any ref and writes placeholder downloads.
    #[derive(Default)]
    struct FakeRemote {
        api_calls: RefCell<Vec<String>>,
        downloads: RefCell<Vec<String>>,
    }

    impl Transport for FakeRemote {
        fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
            let args: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.api_calls
                .borrow_mut()
                .push(format!("{url}?{}", args.join("&")));
            Ok(json!([
                {"sha": SHA, "commit": {"committer": {"date": "2020-03-01T10:00:00Z"}}}
            ]))
        }

        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.downloads.borrow_mut().push(url.to_string());
            fs::write(dest, b"payload")?;
            Ok(())
        }
    }

    /// Simulates tar, configure and make by their effect on disk.
    struct FakeToolchain {
        calls: RefCell<Vec<String>>,
        nsterm: String,
    }

    impl Default for FakeToolchain {
        fn default() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                nsterm: format!("  {NSTERM_LINE}\n"),
            }
        }
    }

    impl FakeToolchain {
        fn count(&self) -> BTreeMap<String, usize> {
            let mut counts = BTreeMap::new();
            for call in self.calls.borrow().iter() {
                *counts.entry(call.clone()).or_insert(0) += 1;
            }
            counts
        }
    }

    impl CommandRunner for FakeToolchain {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
            let args: Vec<String> = spec
                .args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            match (spec.program.as_str(), args.first().map(String::as_str)) {
                ("tar", Some("-xzf")) => {
                    let stem = Path::new(&args[1])
                        .file_stem()
                        .ok_or_else(|| anyhow!("bad tarball arg"))?;
                    let tree = spec.cwd.join(stem);
                    fs::create_dir_all(tree.join("src"))?;
                    fs::write(tree.join("src/nsterm.m"), &self.nsterm)?;
                    fs::write(tree.join("autogen.sh"), "#!/bin/sh\n")?;
                }
                ("tar", Some("-cjf")) => fs::write(&args[1], b"bz2")?,
                ("make", Some("install")) => {
                    fs::create_dir_all(spec.cwd.join("nextstep/Emacs.app/Contents"))?;
                }
                _ => {}
            }
            self.calls.borrow_mut().push(spec.display());
            Ok(CommandOutcome {
                code: Some(0),
                ..CommandOutcome::default()
            })
        }
    }

    fn config(root: &Path, options: BuildOptions) -> PipelineConfig {
        PipelineConfig::new(root, options).expect("config")
    }

    #[test]
    fn full_run_lays_out_every_stage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let remote = FakeRemote::default();
        let toolchain = FakeToolchain::default();
        let config = config(
            temp.path(),
            BuildOptions {
                enable_srgb_patch: true,
                ..BuildOptions::default()
            },
        );

        let out = run(&config, &remote, &toolchain, "master").expect("run");

        let root = temp.path();
        assert_eq!(out.tarball, root.join("tarballs/emacs-mirror-emacs-abcdef1.tgz"));
        assert_eq!(out.source, root.join("sources/emacs-mirror-emacs-abcdef1"));
        assert_eq!(
            out.bundle,
            root.join("sources/emacs-mirror-emacs-abcdef1/nextstep/Emacs.app")
        );
        assert_eq!(out.archive, root.join("builds/Emacs.app-2020-03-01-(abcdef1).tbz"));
        assert!(out.archive.is_file());

        let nsterm = fs::read_to_string(out.source.join("src/nsterm.m")).expect("read");
        assert!(nsterm.contains("colorWithDeviceRed"));
        assert!(!nsterm.contains("colorWithCalibratedRed"));

        assert_eq!(
            *remote.api_calls.borrow(),
            vec!["https://api.github.com/repos/emacs-mirror/emacs/commits?sha=master&per_page=1"]
        );
        assert_eq!(
            *remote.downloads.borrow(),
            vec![format!("https://github.com/emacs-mirror/emacs/tarball/{SHA}")]
        );
        let calls = toolchain.calls.borrow();
        assert_eq!(calls[1], "./autogen.sh");
        assert_eq!(calls[2], "./configure --with-ns");
    }

    #[test]
    fn second_run_does_no_work() {
        let temp = tempfile::tempdir().expect("tempdir");
        let remote = FakeRemote::default();
        let toolchain = FakeToolchain::default();
        let config = config(
            temp.path(),
            BuildOptions {
                enable_srgb_patch: true,
                patch_urls: vec!["https://example.com/fix.diff".to_string()],
                ..BuildOptions::default()
            },
        );

        let first = run(&config, &remote, &toolchain, "master").expect("first run");
        let downloads_after_first = remote.downloads.borrow().len();
        let counts_after_first = toolchain.count();

        let second = run(&config, &remote, &toolchain, "master").expect("second run");

        assert_eq!(first, second);
        assert_eq!(downloads_after_first, 2);
        assert_eq!(remote.downloads.borrow().len(), downloads_after_first);
        assert_eq!(toolchain.count(), counts_after_first);
        assert_eq!(remote.api_calls.borrow().len(), 2);
    }

    #[test]
    fn refs_resolving_to_one_revision_share_outputs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let remote = FakeRemote::default();
        let toolchain = FakeToolchain::default();
        let config = config(temp.path(), BuildOptions::default());

        let by_branch = run(&config, &remote, &toolchain, "master").expect("branch");
        let by_hash = run(&config, &remote, &toolchain, SHA).expect("hash");
        let by_tag = run(&config, &remote, &toolchain, "emacs-27.1").expect("tag");

        assert_eq!(by_branch, by_hash);
        assert_eq!(by_hash, by_tag);
        assert_eq!(remote.downloads.borrow().len(), 1);
    }

    #[test]
    fn failed_patch_is_not_reused_by_a_rerun() {
        let temp = tempfile::tempdir().expect("tempdir");
        let remote = FakeRemote::default();
        let toolchain = FakeToolchain {
            nsterm: "  [NSColor colorWithSRGBRed: r green: g blue: b alpha: 1.0];\n".to_string(),
            ..FakeToolchain::default()
        };
        let config = config(
            temp.path(),
            BuildOptions {
                enable_srgb_patch: true,
                ..BuildOptions::default()
            },
        );
        let tree = temp.path().join("sources/emacs-mirror-emacs-abcdef1");

        for attempt in ["first", "second"] {
            let err = run(&config, &remote, &toolchain, "master").expect_err(attempt);
            assert!(
                matches!(
                    err.downcast_ref::<PipelineError>(),
                    Some(PipelineError::PatchNoMatch { .. })
                ),
                "{attempt} run: {err:#}"
            );
            assert!(!tree.exists(), "{attempt} run left {}", tree.display());
        }

        let calls = toolchain.calls.borrow();
        let extractions = calls.iter().filter(|call| call.starts_with("tar -xzf")).count();
        assert_eq!(extractions, 2);
        assert!(calls.iter().all(|call| !call.starts_with("make")));
        let builds = fs::read_dir(temp.path().join("builds")).expect("dir").count();
        assert_eq!(builds, 0);
    }

    #[test]
    fn unresolvable_ref_stops_before_any_download() {
        struct BrokenApi;

        impl Transport for BrokenApi {
            fn get_json(&self, _url: &str, _query: &[(&str, &str)]) -> Result<Value> {
                Ok(json!({"message": "No commit found for SHA: nope"}))
            }

            fn download(&self, url: &str, _dest: &Path) -> Result<()> {
                Err(anyhow!("unexpected download {url}"))
            }
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let toolchain = FakeToolchain::default();
        let config = config(temp.path(), BuildOptions::default());

        let err = run(&config, &BrokenApi, &toolchain, "nope").expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Resolution { .. })
        ));
        assert!(toolchain.calls.borrow().is_empty());
        let tarballs = fs::read_dir(temp.path().join("tarballs")).expect("dir").count();
        assert_eq!(tarballs, 0);
    }
}
