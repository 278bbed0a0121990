//! End-to-end sync against a local upstream repository, using real `git` and
//! `sh` as the test command.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;

use fixture_sync::error::SyncError;
use fixture_sync::io::config::{ArtifactSpec, SyncConfig};
use fixture_sync::io::git::{GitLimits, GitSourceControl};
use fixture_sync::io::test_runner::CommandTestRunner;
use fixture_sync::sync::FixtureSync;

const GENERATOR_V1: &str = "mkdir -p build\nprintf 'state v1\\n' > build/state.ron\nprintf '#0 v1\\n' > build/spade.vcd\n";
const GENERATOR_V2: &str = "mkdir -p build\nprintf 'state v2\\n' > build/state.ron\nprintf '#0 v2\\n' > build/spade.vcd\n";

fn git(root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .unwrap_or_else(|e| panic!("spawn git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Upstream with two commits; returns the full id of the first one.
fn init_upstream(root: &Path) -> String {
    fs::create_dir_all(root.join("swim_tests")).expect("mkdir");
    git(root, &["init", "--quiet"]);
    git(root, &["config", "user.name", "Fixture Sync"]);
    git(root, &["config", "user.email", "fixture-sync@local.invalid"]);
    fs::write(root.join("swim_tests/gen.sh"), GENERATOR_V1).expect("write");
    git(root, &["add", "."]);
    git(root, &["commit", "--quiet", "-m", "v1"]);
    let first = git(root, &["rev-parse", "HEAD"]);
    fs::write(root.join("swim_tests/gen.sh"), GENERATOR_V2).expect("write");
    git(root, &["commit", "--quiet", "-am", "v2"]);
    first
}

fn config(upstream: &Path, dest: &Path, revision: &str) -> SyncConfig {
    SyncConfig {
        repo_url: upstream.to_string_lossy().to_string(),
        revision: revision.to_string(),
        test_command: vec!["sh".into(), "gen.sh".into()],
        dest_dir: dest.to_path_buf(),
        step_timeout_secs: Some(60),
        ..SyncConfig::default()
    }
}

fn scm(config: &SyncConfig) -> GitSourceControl {
    GitSourceControl {
        limits: GitLimits {
            timeout: config.step_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        },
    }
}

#[test]
fn regenerates_fixtures_from_pinned_commit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    let first = init_upstream(&upstream);
    let temp_root = temp.path().join("tmp");
    fs::create_dir_all(&temp_root).expect("mkdir");
    let dest = temp.path().join("examples");

    let cfg = config(&upstream, &dest, &first);
    let report = FixtureSync::new(&cfg, scm(&cfg), CommandTestRunner)
        .with_temp_root(&temp_root)
        .run()
        .expect("sync");

    assert_eq!(report.commit, first);
    assert_eq!(
        fs::read_to_string(dest.join("spade_state.ron")).expect("read"),
        "state v1\n"
    );
    assert_eq!(
        fs::read_to_string(dest.join("spade.vcd")).expect("read"),
        "#0 v1\n"
    );
    assert_eq!(fs::read_dir(&temp_root).expect("read").count(), 0);
}

#[test]
fn failing_generator_reports_test_run_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    let first = init_upstream(&upstream);
    let temp_root = temp.path().join("tmp");
    fs::create_dir_all(&temp_root).expect("mkdir");
    let dest = temp.path().join("examples");

    let mut cfg = config(&upstream, &dest, &first);
    cfg.test_command = vec![
        "sh".into(),
        "-c".into(),
        "sh gen.sh && echo 'synthesis error' >&2 && exit 1".into(),
    ];
    let err = FixtureSync::new(&cfg, scm(&cfg), CommandTestRunner)
        .with_temp_root(&temp_root)
        .run()
        .expect_err("failure");

    match err {
        SyncError::TestRunFailed { diagnostic, .. } => {
            assert!(diagnostic.contains("synthesis error"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
    assert_eq!(fs::read_dir(&temp_root).expect("read").count(), 0);
}

#[test]
fn unknown_revision_is_checkout_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    init_upstream(&upstream);
    let temp_root = temp.path().join("tmp");
    fs::create_dir_all(&temp_root).expect("mkdir");

    let cfg = config(&upstream, &temp.path().join("examples"), "v9.9.9");
    let err = FixtureSync::new(&cfg, scm(&cfg), CommandTestRunner)
        .with_temp_root(&temp_root)
        .run()
        .expect_err("failure");

    assert!(matches!(err, SyncError::CheckoutFailed { .. }));
    assert_eq!(fs::read_dir(&temp_root).expect("read").count(), 0);
}

#[test]
fn renamed_artifact_lands_under_configured_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    let first = init_upstream(&upstream);
    let temp_root = temp.path().join("tmp");
    fs::create_dir_all(&temp_root).expect("mkdir");
    let dest = temp.path().join("fixtures");

    let mut cfg = config(&upstream, &dest, &first);
    cfg.artifacts = vec![ArtifactSpec::new("build/spade.vcd", "wave.vcd")];
    FixtureSync::new(&cfg, scm(&cfg), CommandTestRunner)
        .with_temp_root(&temp_root)
        .run()
        .expect("sync");

    assert_eq!(
        fs::read_to_string(dest.join("wave.vcd")).expect("read"),
        "#0 v1\n"
    );
    assert_eq!(fs::read_dir(&dest).expect("read").count(), 1);
}
