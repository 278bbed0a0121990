//! Sync configuration stored in `fixture-sync.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Default config file, relative to the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "fixture-sync.toml";

/// Upstream repository the fixtures are generated from.
pub const DEFAULT_REPO_URL: &str = "https://gitlab.com/spade-lang/spade.git";

/// Upstream revision the checked-in fixtures were generated from.
pub const PINNED_REVISION: &str = "v0.13.0";

/// One file to copy out of the test directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Path relative to the test directory.
    pub source: PathBuf,
    /// File name inside the destination directory.
    pub dest: String,
}

impl ArtifactSpec {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// Sync configuration (TOML).
///
/// Missing fields fall back to the values that regenerate the Spade fixtures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub repo_url: String,

    /// Commit, tag or branch to check out.
    pub revision: String,

    /// Subdirectory of the checkout where `test_command` runs.
    pub test_dir: PathBuf,

    /// Argv of the test command; executed directly, not through a shell.
    pub test_command: Vec<String>,

    /// Directory receiving the fixtures.
    pub dest_dir: PathBuf,

    /// Per-step wall-clock limit for clone, checkout and the test command.
    /// Unset means wait indefinitely.
    pub step_timeout_secs: Option<u64>,

    /// Truncate captured stdout/stderr of child processes beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Name prefix of the temporary working directory.
    pub workdir_prefix: String,

    pub artifacts: Vec<ArtifactSpec>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_string(),
            revision: PINNED_REVISION.to_string(),
            test_dir: PathBuf::from("swim_tests"),
            test_command: vec!["swim".to_string(), "test".to_string()],
            dest_dir: PathBuf::from("examples"),
            step_timeout_secs: None,
            output_limit_bytes: 100_000,
            workdir_prefix: "fixture-sync-".to_string(),
            artifacts: vec![
                ArtifactSpec::new("build/state.ron", "spade_state.ron"),
                ArtifactSpec::new("build/spade.vcd", "spade.vcd"),
            ],
        }
    }
}

impl SyncConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid =
            |msg: String| -> Result<(), SyncError> { Err(SyncError::InvalidConfig(msg)) };

        if self.repo_url.trim().is_empty() {
            return invalid("repo_url must not be empty".into());
        }
        if self.revision.is_empty() {
            return invalid("revision must not be empty".into());
        }
        if self.revision.starts_with('-') || self.revision.chars().any(char::is_whitespace) {
            return invalid(format!("revision {:?} is not a valid identifier", self.revision));
        }
        if !is_plain_relative(&self.test_dir) {
            return invalid(format!(
                "test_dir {} must be a relative path inside the checkout",
                self.test_dir.display()
            ));
        }
        if self.test_command.is_empty() || self.test_command[0].trim().is_empty() {
            return invalid("test_command must be a non-empty array".into());
        }
        if self.output_limit_bytes == 0 {
            return invalid("output_limit_bytes must be > 0".into());
        }
        if self.step_timeout_secs == Some(0) {
            return invalid("step_timeout_secs must be > 0 when set".into());
        }
        if self.workdir_prefix.contains(['/', '\\']) {
            return invalid("workdir_prefix must not contain path separators".into());
        }
        if self.artifacts.is_empty() {
            return invalid("at least one artifact is required".into());
        }
        let mut dests = BTreeSet::new();
        for artifact in &self.artifacts {
            if !is_plain_relative(&artifact.source) || artifact.source.as_os_str().is_empty() {
                return invalid(format!(
                    "artifact source {} must be a relative path inside test_dir",
                    artifact.source.display()
                ));
            }
            if !is_file_name(&artifact.dest) {
                return invalid(format!(
                    "artifact dest {:?} must be a plain file name",
                    artifact.dest
                ));
            }
            if !dests.insert(artifact.dest.as_str()) {
                return invalid(format!("artifact dest {:?} is listed twice", artifact.dest));
            }
        }
        Ok(())
    }

    /// Resolve a relative `dest_dir` against `base` so later steps only see absolute paths.
    pub fn anchor_dest_dir(&mut self, base: &Path) {
        if self.dest_dir.is_relative() {
            self.dest_dir = base.join(&self.dest_dir);
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_file_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && name != "."
        && name != ".."
        && path.components().count() == 1
        && matches!(path.components().next(), Some(Component::Normal(_)))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SyncConfig::default()`. Validation is left
/// to the caller so CLI overrides can be applied first.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SyncConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Render config as TOML with a trailing newline.
pub fn render_config(cfg: &SyncConfig) -> Result<String> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(buf)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SyncConfig) -> Result<()> {
    cfg.validate()?;
    let buf = render_config(cfg)?;
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
