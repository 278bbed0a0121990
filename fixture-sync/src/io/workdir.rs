//! Scoped temporary working directory for one sync run.

use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::SyncError;

/// Ephemeral directory exclusively owned by one run.
///
/// Dropping the guard removes the directory; [`WorkDir::close`] does the same
/// but reports a failed removal.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh directory named `<prefix><random>` under `parent`.
    pub fn create_in(parent: &Path, prefix: &str) -> Result<Self, SyncError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|source| SyncError::WorkDir {
                parent: parent.to_path_buf(),
                source,
            })?;
        debug!(path = %dir.path().display(), "working directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now.
    pub fn close(self) -> Result<(), SyncError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| SyncError::CleanupFailed { path, source })
    }

    /// Remove the directory, logging instead of returning a failure.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        match self.close() {
            Ok(()) => debug!(path = %path.display(), "working directory removed"),
            Err(err) => warn!(err = %err, "working directory cleanup failed"),
        }
    }
}
