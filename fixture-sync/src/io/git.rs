//! Git adapter for fetching the pinned upstream revision.
//!
//! Every call runs `git` with an explicit working directory; the process
//! current directory is never changed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, instrument};

use super::process::{CommandOutput, run_command};

/// Fetches a repository and pins it to a revision.
pub trait SourceControl {
    /// Clone `url` into `dest`, which must not exist yet.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Check out `revision` in the repository at `repo` and return the full
    /// commit id it resolved to.
    fn checkout(&self, repo: &Path, revision: &str) -> Result<String>;
}

impl<S: SourceControl + ?Sized> SourceControl for &S {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        (**self).clone_repo(url, dest)
    }

    fn checkout(&self, repo: &Path, revision: &str) -> Result<String> {
        (**self).checkout(repo, revision)
    }
}

/// Limits applied to every spawned `git` process.
#[derive(Debug, Clone, Copy)]
pub struct GitLimits {
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    limits: GitLimits,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, limits: GitLimits) -> Self {
        Self {
            workdir: workdir.into(),
            limits,
        }
    }

    /// Clone `url` into `dest` and return a handle rooted at the new checkout.
    #[instrument(skip_all, fields(url, dest = %dest.display()))]
    pub fn clone(url: &str, dest: &Path, limits: GitLimits) -> Result<Self> {
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("clone destination has no parent: {}", dest.display()))?;
        let dest_arg = dest.to_string_lossy();
        let git = Git::new(parent, limits);
        debug!(url, "cloning repository");
        git.run_checked(&["clone", "--quiet", "--", url, &dest_arg])?;
        Ok(Git::new(dest, limits))
    }

    /// Detach HEAD at `revision` (commit, tag or branch).
    #[instrument(skip_all, fields(revision))]
    pub fn checkout_detached(&self, revision: &str) -> Result<()> {
        debug!(revision, "checking out revision");
        self.run_checked(&["checkout", "--quiet", "--detach", revision])?;
        Ok(())
    }

    /// Return the full commit id of HEAD.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--verify", "HEAD^{commit}"])?;
        let sha = out.trim().to_string();
        if sha.is_empty() {
            bail!("git rev-parse returned no commit id");
        }
        Ok(sha)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                output.diagnostic()
            ));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0");
        run_command(cmd, self.limits.timeout, self.limits.output_limit_bytes)
    }
}

/// [`SourceControl`] backed by the `git` binary on `PATH`.
#[derive(Debug, Clone, Copy)]
pub struct GitSourceControl {
    pub limits: GitLimits,
}

impl SourceControl for GitSourceControl {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        Git::clone(url, dest, self.limits)?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, revision: &str) -> Result<String> {
        let git = Git::new(repo, self.limits);
        git.checkout_detached(revision)?;
        let sha = git.head_sha()?;
        debug!(revision, commit = %sha, "revision resolved");
        Ok(sha)
    }
}
