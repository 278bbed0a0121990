//! The fixture sync run: clone, checkout, test, copy, clean up.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument};

use crate::cancel::CancelFlag;
use crate::error::SyncError;
use crate::io::artifacts::{self, InstalledFixture};
use crate::io::config::SyncConfig;
use crate::io::git::SourceControl;
use crate::io::process::display_argv;
use crate::io::test_runner::{TestOutcome, TestRequest, TestRunner};
use crate::io::workdir::WorkDir;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Revision as requested.
    pub revision: String,
    /// Full commit id the revision resolved to.
    pub commit: String,
    pub fixtures: Vec<InstalledFixture>,
}

/// Regenerates fixtures by driving an external toolchain.
pub struct FixtureSync<'a, S, T> {
    config: &'a SyncConfig,
    scm: S,
    tests: T,
    cancel: CancelFlag,
    temp_root: PathBuf,
}

impl<'a, S: SourceControl, T: TestRunner> FixtureSync<'a, S, T> {
    pub fn new(config: &'a SyncConfig, scm: S, tests: T) -> Self {
        Self {
            config,
            scm,
            tests,
            cancel: CancelFlag::new(),
            temp_root: std::env::temp_dir(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Parent of the per-run working directory (defaults to the OS temp dir).
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// The working directory is removed whatever the outcome. Destination
    /// files are only written once the test command passed and every
    /// artifact was found.
    #[instrument(skip_all, fields(revision = %self.config.revision))]
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        self.config.validate()?;
        self.cancel.check()?;

        let workdir = WorkDir::create_in(&self.temp_root, &self.config.workdir_prefix)?;
        let result = self.run_in(workdir.path());
        workdir.release();

        match result {
            Err(_) if self.cancel.is_cancelled() => Err(SyncError::Interrupted),
            other => other,
        }
    }

    fn run_in(&self, workdir: &Path) -> Result<SyncReport, SyncError> {
        let cfg = self.config;
        let checkout = workdir.join("checkout");

        info!(url = %cfg.repo_url, "cloning upstream");
        self.scm
            .clone_repo(&cfg.repo_url, &checkout)
            .map_err(|err| SyncError::CloneFailed {
                url: cfg.repo_url.clone(),
                diagnostic: format!("{err:#}"),
            })?;
        self.cancel.check()?;

        let commit = self
            .scm
            .checkout(&checkout, &cfg.revision)
            .map_err(|err| SyncError::CheckoutFailed {
                revision: cfg.revision.clone(),
                diagnostic: format!("{err:#}"),
            })?;
        info!(commit = %commit, "revision checked out");
        self.cancel.check()?;

        let test_dir = checkout.join(&cfg.test_dir);
        let command = display_argv(&cfg.test_command);
        let request = TestRequest {
            workdir: test_dir.clone(),
            argv: cfg.test_command.clone(),
            timeout: cfg.step_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        };
        match self.tests.run(&request) {
            Ok(TestOutcome::Pass) => info!(command = %command, "test command passed"),
            Ok(TestOutcome::Fail { diagnostic }) => {
                return Err(SyncError::TestRunFailed {
                    command,
                    diagnostic,
                });
            }
            Err(err) => {
                return Err(SyncError::TestRunFailed {
                    command,
                    diagnostic: format!("{err:#}"),
                });
            }
        }
        self.cancel.check()?;

        let located = artifacts::locate(&test_dir, &cfg.artifacts)?;
        let fixtures = artifacts::install(&located, &cfg.dest_dir)?;
        for fixture in &fixtures {
            info!(
                path = %fixture.path.display(),
                bytes = fixture.bytes,
                sha256 = %fixture.sha256,
                "fixture written"
            );
        }

        Ok(SyncReport {
            revision: cfg.revision.clone(),
            commit,
            fixtures,
        })
    }
}
