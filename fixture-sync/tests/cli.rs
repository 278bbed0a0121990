//! CLI tests for the `fixture-sync` binary.
//!
//! Spawns the binary and checks stdout and exit codes.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;

use fixture_sync::exit_codes;
use fixture_sync::io::config::{PINNED_REVISION, SyncConfig, load_config};

fn bin(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fixture-sync"));
    cmd.current_dir(cwd).env("RUST_LOG", "off");
    cmd
}

fn git(root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

fn upstream_with_script(root: &Path, script: &str) {
    fs::create_dir_all(root.join("swim_tests")).expect("mkdir");
    fs::write(root.join("swim_tests/gen.sh"), script).expect("write");
    git(root, &["init", "--quiet"]);
    git(root, &["config", "user.name", "Fixture Sync"]);
    git(root, &["config", "user.email", "fixture-sync@local.invalid"]);
    git(root, &["add", "."]);
    git(root, &["commit", "--quiet", "-m", "init"]);
}

fn write_project_config(path: &Path, upstream: &Path) {
    let cfg = SyncConfig {
        repo_url: upstream.to_string_lossy().to_string(),
        revision: "HEAD".into(),
        test_command: vec!["sh".into(), "gen.sh".into()],
        step_timeout_secs: Some(60),
        ..SyncConfig::default()
    };
    fixture_sync::io::config::write_config(path, &cfg).expect("write config");
}

#[test]
fn config_prints_defaults_as_toml() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = bin(temp.path()).arg("config").output().expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("revision = \"{PINNED_REVISION}\"")));
    assert!(stdout.contains("spade_state.ron"));
}

#[test]
fn config_write_applies_overrides() {
    let temp = tempfile::tempdir().expect("tempdir");
    let status = bin(temp.path())
        .args(["config", "--write", "--revision", "deadbeef"])
        .status()
        .expect("run");

    assert_eq!(status.code(), Some(exit_codes::OK));
    let cfg = load_config(&temp.path().join("fixture-sync.toml")).expect("load");
    assert_eq!(cfg.revision, "deadbeef");
    assert_eq!(cfg.dest_dir, std::path::PathBuf::from("examples"));
    let raw = fs::read_to_string(temp.path().join("fixture-sync.toml")).expect("read");
    assert!(raw.contains("dest_dir = \"examples\""));
}

#[test]
fn invalid_override_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = bin(temp.path())
        .args(["--revision", "has space"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}

#[test]
fn sync_writes_fixtures_and_prints_summary() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    upstream_with_script(
        &upstream,
        "mkdir -p build && echo state > build/state.ron && echo wave > build/spade.vcd\n",
    );
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("mkdir");
    write_project_config(&project.join("fixture-sync.toml"), &upstream);
    let tmp = temp.path().join("tmp");
    fs::create_dir_all(&tmp).expect("mkdir");

    let output = bin(&project).env("TMPDIR", &tmp).output().expect("run");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("sync: revision=HEAD commit="));
    assert_eq!(stdout.matches("fixture: ").count(), 2);
    assert_eq!(
        fs::read_to_string(project.join("examples/spade.vcd")).expect("read"),
        "wave\n"
    );
    assert_eq!(fs::read_dir(&tmp).expect("read").count(), 0);
}

#[test]
fn sync_json_report_lists_fixtures() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    upstream_with_script(
        &upstream,
        "mkdir -p build && echo state > build/state.ron && echo wave > build/spade.vcd\n",
    );
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("mkdir");
    write_project_config(&project.join("fixture-sync.toml"), &upstream);

    let output = bin(&project).arg("--json").output().expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["revision"], "HEAD");
    assert_eq!(report["fixtures"].as_array().expect("array").len(), 2);
    assert_eq!(report["fixtures"][1]["bytes"], 5);
}

#[test]
fn failing_test_command_exits_with_test_run_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    upstream_with_script(&upstream, "echo 'simulation failed' >&2\nexit 1\n");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("mkdir");
    write_project_config(&project.join("fixture-sync.toml"), &upstream);

    let output = bin(&project).output().expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::TEST_RUN_FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("simulation failed"));
    assert!(!project.join("examples").exists());
}

#[test]
fn missing_artifact_exits_with_artifact_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let upstream = temp.path().join("upstream");
    upstream_with_script(&upstream, "mkdir -p build && echo state > build/state.ron\n");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("mkdir");
    write_project_config(&project.join("fixture-sync.toml"), &upstream);

    let output = bin(&project).output().expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::ARTIFACT_MISSING));
    assert!(!project.join("examples/spade_state.ron").exists());
}
