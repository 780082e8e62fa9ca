//! Writing a migration plan to disk.
//!
//! Every file is first staged into a temporary file in its target directory.
//! Targets are only replaced once all of them have been staged, so a failure
//! while staging leaves the solution untouched.

use cpm_pkg::FileWrite;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to stage {}: {source}; no file was changed", .path.display())]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "failed to replace {}: {source}; {committed} of {total} files were already written",
        .path.display()
    )]
    Commit {
        path: PathBuf,
        committed: usize,
        total: usize,
        source: std::io::Error,
    },
}

impl PersistError {
    /// Number of targets replaced before the failure
    pub fn committed(&self) -> usize {
        match self {
            Self::Stage { .. } => 0,
            Self::Commit { committed, .. } => *committed,
        }
    }
}

fn stage(write: &FileWrite) -> Result<NamedTempFile, PersistError> {
    let dir = match write.path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stage_err = |source| PersistError::Stage {
        path: write.path.clone(),
        source,
    };

    let mut file = NamedTempFile::new_in(dir).map_err(stage_err)?;
    file.write_all(write.content.as_bytes()).map_err(stage_err)?;
    file.flush().map_err(stage_err)?;
    if let Ok(metadata) = std::fs::metadata(&write.path) {
        file.as_file()
            .set_permissions(metadata.permissions())
            .map_err(stage_err)?;
    }
    Ok(file)
}

/// Write every planned file, returning how many were written.
pub fn persist(writes: &[FileWrite]) -> Result<usize, PersistError> {
    let staged = writes
        .iter()
        .map(|write| stage(write).map(|file| (file, &write.path)))
        .collect::<Result<Vec<_>, _>>()?;

    let total = staged.len();
    for (committed, (file, path)) in staged.into_iter().enumerate() {
        file.persist(path).map_err(|err| PersistError::Commit {
            path: path.clone(),
            committed,
            total,
            source: err.error,
        })?;
        tracing::info!(path = %path.display(), "saved");
    }
    Ok(total)
}
