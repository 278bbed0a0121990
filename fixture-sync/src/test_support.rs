//! Scripted collaborators for exercising a sync run without network or toolchain.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::cancel::CancelFlag;
use crate::io::config::SyncConfig;
use crate::io::git::SourceControl;
use crate::io::test_runner::{TestOutcome, TestRequest, TestRunner};

/// Default config with `dest_dir` at `<root>/examples`.
pub fn config_for(root: &Path) -> SyncConfig {
    SyncConfig {
        dest_dir: root.join("examples"),
        ..SyncConfig::default()
    }
}

/// Artifacts as the default config expects them, relative to the test directory.
pub const SPADE_ARTIFACTS: &[(&str, &[u8])] = &[
    ("build/state.ron", b"(instances: [])\n"),
    ("build/spade.vcd", b"$timescale 1ns $end\n#0\n"),
];

/// [`SourceControl`] that creates an empty checkout directory.
#[derive(Debug)]
pub struct ScriptedScm {
    commit: String,
    clone_error: Option<String>,
    checkout_error: Option<String>,
    clone_calls: Cell<usize>,
    checkouts: RefCell<Vec<PathBuf>>,
}

impl ScriptedScm {
    pub fn ok(commit: &str) -> Self {
        Self {
            commit: commit.to_string(),
            clone_error: None,
            checkout_error: None,
            clone_calls: Cell::new(0),
            checkouts: RefCell::new(Vec::new()),
        }
    }

    pub fn clone_fails(message: &str) -> Self {
        Self {
            clone_error: Some(message.to_string()),
            ..Self::ok("")
        }
    }

    pub fn checkout_fails(message: &str) -> Self {
        Self {
            checkout_error: Some(message.to_string()),
            ..Self::ok("")
        }
    }

    pub fn clone_calls(&self) -> usize {
        self.clone_calls.get()
    }

    /// Checkout directories created so far.
    pub fn checkouts(&self) -> Vec<PathBuf> {
        self.checkouts.borrow().clone()
    }
}

impl SourceControl for ScriptedScm {
    fn clone_repo(&self, _url: &str, dest: &Path) -> Result<()> {
        self.clone_calls.set(self.clone_calls.get() + 1);
        fs::create_dir_all(dest)?;
        self.checkouts.borrow_mut().push(dest.to_path_buf());
        match &self.clone_error {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }

    fn checkout(&self, _repo: &Path, _revision: &str) -> Result<String> {
        match &self.checkout_error {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(self.commit.clone()),
        }
    }
}

/// [`TestRunner`] that writes a fixed set of files and then reports an outcome.
#[derive(Debug)]
pub struct ScriptedTests {
    files: Vec<(PathBuf, Vec<u8>)>,
    outcome: TestOutcome,
    spawn_error: Option<String>,
    cancel_on_run: Option<CancelFlag>,
    requests: RefCell<Vec<TestRequest>>,
}

impl ScriptedTests {
    pub fn pass_with(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, contents)| (PathBuf::from(path), contents.to_vec()))
                .collect(),
            outcome: TestOutcome::Pass,
            spawn_error: None,
            cancel_on_run: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Writes `files` and still fails, like a test suite that dumps partial output.
    pub fn fail_with(files: &[(&str, &[u8])], diagnostic: &str) -> Self {
        Self {
            outcome: TestOutcome::Fail {
                diagnostic: diagnostic.to_string(),
            },
            ..Self::pass_with(files)
        }
    }

    pub fn spawn_error(message: &str) -> Self {
        Self {
            spawn_error: Some(message.to_string()),
            ..Self::pass_with(&[])
        }
    }

    /// Simulates a child killed by Ctrl-C: raises `cancel` and fails.
    pub fn interrupted(cancel: CancelFlag) -> Self {
        Self::fail_with(&[], "signal: 2 (SIGINT)").cancelling(cancel)
    }

    /// Raise `cancel` while running, keeping the scripted outcome.
    pub fn cancelling(mut self, cancel: CancelFlag) -> Self {
        self.cancel_on_run = Some(cancel);
        self
    }

    pub fn requests(&self) -> Vec<TestRequest> {
        self.requests.borrow().clone()
    }
}

impl TestRunner for ScriptedTests {
    fn run(&self, request: &TestRequest) -> Result<TestOutcome> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(msg) = &self.spawn_error {
            return Err(anyhow!("{msg}"));
        }
        for (path, contents) in &self.files {
            let target = request.workdir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, contents)?;
        }
        if let Some(cancel) = &self.cancel_on_run {
            cancel.cancel();
        }
        Ok(self.outcome.clone())
    }
}
