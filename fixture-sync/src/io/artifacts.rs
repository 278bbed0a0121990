//! Locating build artifacts and installing them as fixtures.
//!
//! Installation is two-phase: every artifact is copied to a temp file next to
//! its destination, and only when all copies succeeded are they renamed into
//! place. A failed copy leaves existing fixtures untouched.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use super::config::ArtifactSpec;
use crate::error::SyncError;

/// An artifact confirmed to exist after the test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifact {
    pub source: PathBuf,
    pub dest_name: String,
}

/// A fixture written to the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledFixture {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Resolve every spec against `test_dir`; fail on the first one that is not a regular file.
pub fn locate(test_dir: &Path, specs: &[ArtifactSpec]) -> Result<Vec<LocatedArtifact>, SyncError> {
    specs
        .iter()
        .map(|spec| {
            let source = test_dir.join(&spec.source);
            if !source.is_file() {
                return Err(SyncError::ArtifactMissing { path: source });
            }
            Ok(LocatedArtifact {
                source,
                dest_name: spec.dest.clone(),
            })
        })
        .collect()
}

struct Staged {
    file: NamedTempFile,
    dest: PathBuf,
    bytes: u64,
    sha256: String,
}

/// Copy `artifacts` into `dest_dir`, overwriting existing files.
#[instrument(skip_all, fields(dest_dir = %dest_dir.display(), count = artifacts.len()))]
pub fn install(
    artifacts: &[LocatedArtifact],
    dest_dir: &Path,
) -> Result<Vec<InstalledFixture>, SyncError> {
    if let Some(first) = artifacts.first() {
        fs::create_dir_all(dest_dir).map_err(|source| SyncError::CopyFailed {
            from: first.source.clone(),
            to: dest_dir.to_path_buf(),
            source,
        })?;
    }

    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let dest = dest_dir.join(&artifact.dest_name);
        let entry = stage(&artifact.source, dest_dir, &dest).map_err(|source| {
            SyncError::CopyFailed {
                from: artifact.source.clone(),
                to: dest.clone(),
                source,
            }
        })?;
        debug!(dest = %dest.display(), bytes = entry.bytes, "artifact staged");
        staged.push(entry);
    }

    let mut installed = Vec::with_capacity(staged.len());
    for entry in staged {
        let tmp_path = entry.file.path().to_path_buf();
        entry
            .file
            .persist(&entry.dest)
            .map_err(|err| SyncError::CopyFailed {
                from: tmp_path,
                to: entry.dest.clone(),
                source: err.error,
            })?;
        installed.push(InstalledFixture {
            path: entry.dest,
            bytes: entry.bytes,
            sha256: entry.sha256,
        });
    }
    Ok(installed)
}

fn stage(source: &Path, dest_dir: &Path, dest: &Path) -> std::io::Result<Staged> {
    let mut input = File::open(source)?;
    let permissions = input.metadata()?.permissions();
    let mut file = tempfile::Builder::new()
        .prefix(".fixture-sync-")
        .suffix(".tmp")
        .tempfile_in(dest_dir)?;

    let mut hasher = Sha256::new();
    let mut bytes = 0u64;
    let mut chunk = [0u8; 8192];
    loop {
        let n = input.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        file.write_all(&chunk[..n])?;
        bytes += n as u64;
    }
    file.as_file().sync_all()?;
    fs::set_permissions(file.path(), permissions)?;

    Ok(Staged {
        file,
        dest: dest.to_path_buf(),
        bytes,
        sha256: hex::encode(hasher.finalize()),
    })
}
