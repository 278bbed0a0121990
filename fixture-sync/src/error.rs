//! Typed failures for a sync run.
//!
//! Each variant names the step that failed and carries the diagnostic of the
//! external tool involved. The binary maps variants to stable exit codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("create working directory under {}: {source}", .parent.display())]
    WorkDir {
        parent: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clone {url} failed: {diagnostic}")]
    CloneFailed { url: String, diagnostic: String },

    #[error("checkout of revision {revision} failed: {diagnostic}")]
    CheckoutFailed { revision: String, diagnostic: String },

    #[error("test command `{command}` failed: {diagnostic}")]
    TestRunFailed { command: String, diagnostic: String },

    #[error("expected artifact {} not found after test run", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("copy {} to {}: {source}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Never fatal: returned by [`crate::io::workdir::WorkDir::close`] and logged.
    #[error("remove working directory {}: {source}", .path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted")]
    Interrupted,
}

impl SyncError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::InvalidConfig(_) | SyncError::WorkDir { .. } => exit_codes::INVALID,
            SyncError::CloneFailed { .. } => exit_codes::CLONE_FAILED,
            SyncError::CheckoutFailed { .. } => exit_codes::CHECKOUT_FAILED,
            SyncError::TestRunFailed { .. } => exit_codes::TEST_RUN_FAILED,
            SyncError::ArtifactMissing { .. } => exit_codes::ARTIFACT_MISSING,
            SyncError::CopyFailed { .. } => exit_codes::COPY_FAILED,
            SyncError::CleanupFailed { .. } => exit_codes::INVALID,
            SyncError::Interrupted => exit_codes::INTERRUPTED,
        }
    }
}
