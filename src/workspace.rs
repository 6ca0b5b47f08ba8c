//! Stage 1: workspace reset.
//!
//! Reset deletes everything under the output directory, so it refuses a
//! filesystem root and any directory that contains the working directory
//! (`--output .`, `--output ..`).

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Output path exists and is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Refusing to empty {0}: it is a filesystem root or contains the working directory")]
    Protected(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub entries_removed: usize,
    pub created: bool,
}

/// Empty `output_dir`, creating it if needed. The directory itself survives.
pub fn reset(output_dir: &Path) -> Result<ResetReport, WorkspaceError> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
        return Ok(ResetReport {
            entries_removed: 0,
            created: true,
        });
    }
    if !output_dir.is_dir() {
        return Err(WorkspaceError::NotADirectory(output_dir.to_path_buf()));
    }
    refuse_protected(output_dir, &std::env::current_dir()?)?;

    let mut entries_removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        entries_removed += 1;
    }
    Ok(ResetReport {
        entries_removed,
        created: false,
    })
}

/// Fail if emptying `output_dir` would wipe a filesystem root or `cwd`.
fn refuse_protected(output_dir: &Path, cwd: &Path) -> Result<(), WorkspaceError> {
    let output = fs::canonicalize(output_dir)?;
    let cwd = fs::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
    if output.parent().is_none() || cwd.starts_with(&output) {
        return Err(WorkspaceError::Protected(output_dir.to_path_buf()));
    }
    Ok(())
}
