//! Adapter for the upstream test command that produces the artifacts.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info, instrument};

use super::process::{display_argv, run_command};

#[derive(Debug, Clone)]
pub struct TestRequest {
    /// Absolute directory the command runs in.
    pub workdir: PathBuf,
    pub argv: Vec<String>,
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail { diagnostic: String },
}

pub trait TestRunner {
    /// Run the command. `Err` means it could not be started at all.
    fn run(&self, request: &TestRequest) -> Result<TestOutcome>;
}

impl<T: TestRunner + ?Sized> TestRunner for &T {
    fn run(&self, request: &TestRequest) -> Result<TestOutcome> {
        (**self).run(request)
    }
}

/// Spawns `argv` directly (no shell).
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTestRunner;

impl TestRunner for CommandTestRunner {
    #[instrument(skip_all, fields(command = %display_argv(&request.argv)))]
    fn run(&self, request: &TestRequest) -> Result<TestOutcome> {
        let Some((program, args)) = request.argv.split_first() else {
            bail!("test command is empty");
        };
        if !request.workdir.is_dir() {
            bail!("test directory {} does not exist", request.workdir.display());
        }
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);

        info!(workdir = %request.workdir.display(), "running test command");
        let output = run_command(cmd, request.timeout, request.output_limit_bytes)?;
        debug!(
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "test command output captured"
        );
        if output.success() {
            Ok(TestOutcome::Pass)
        } else {
            Ok(TestOutcome::Fail {
                diagnostic: output.diagnostic(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn request(workdir: PathBuf, script: &str) -> TestRequest {
        TestRequest {
            workdir,
            argv: vec!["sh".into(), "-c".into(), script.into()],
            timeout: Some(Duration::from_secs(30)),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn passes_and_runs_in_workdir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = CommandTestRunner
            .run(&request(temp.path().to_path_buf(), "echo hi > marker"))
            .expect("run");
        assert_eq!(outcome, TestOutcome::Pass);
        assert!(temp.path().join("marker").exists());
    }

    #[test]
    fn failing_command_reports_diagnostic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = CommandTestRunner
            .run(&request(
                temp.path().to_path_buf(),
                "echo 'simulation mismatch' >&2; exit 1",
            ))
            .expect("run");
        match outcome {
            TestOutcome::Fail { diagnostic } => {
                assert!(diagnostic.contains("simulation mismatch"));
            }
            TestOutcome::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn timeout_is_a_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request(temp.path().to_path_buf(), "sleep 5");
        req.timeout = Some(Duration::from_millis(100));
        let outcome = CommandTestRunner.run(&req).expect("run");
        assert!(matches!(outcome, TestOutcome::Fail { ref diagnostic } if diagnostic.starts_with("timed out")));
    }

    #[test]
    fn missing_workdir_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = CommandTestRunner
            .run(&request(temp.path().join("missing"), "true"))
            .expect_err("should fail");
        assert!(err.to_string().contains("does not exist"));
    }
}
