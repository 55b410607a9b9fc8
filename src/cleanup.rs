//! Removes what a successful move copied out of the download directory

use crate::error::{MoveError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub removed_source_dir: bool,
    /// Top-level entries still in the source directory, sorted
    pub remaining: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Delete copied source files and prune directories they leave empty
///
/// Only paths in `copied` are removed. Failures are logged and reported as
/// warnings; the library copy is already complete at this point.
pub fn cleanup_source(source_dir: &Path, source_is_dir: bool, copied: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();

    for path in copied {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                report.removed.push(path.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} already gone", path.display());
            }
            Err(e) => {
                let err = MoveError::CleanupFailed {
                    path: path.clone(),
                    source: e,
                };
                tracing::warn!("{}", err);
                report.warnings.push(err.to_string());
            }
        }
    }

    if !source_is_dir {
        return report;
    }

    prune_empty_parents(source_dir, copied);

    match fs::remove_dir(source_dir) {
        Ok(()) => {
            tracing::info!("Removed empty source directory {}", source_dir.display());
            report.removed_source_dir = true;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            report.removed_source_dir = true;
        }
        Err(_) => {
            report.remaining = list_remaining(source_dir, copied);
            if !report.remaining.is_empty() {
                tracing::info!(
                    "{} entries left in {}",
                    report.remaining.len(),
                    source_dir.display()
                );
            }
        }
    }

    report
}

/// Walk up from each copied file, removing directories that are now empty,
/// stopping below `source_dir`
fn prune_empty_parents(source_dir: &Path, copied: &[PathBuf]) {
    for path in copied {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == source_dir || !dir.starts_with(source_dir) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            tracing::debug!("Removed empty directory {}", dir.display());
            current = dir.parent();
        }
    }
}

/// Top-level entries of `source_dir` minus `exclude`, sorted
pub fn list_remaining(source_dir: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let excluded: HashSet<&Path> = exclude.iter().map(PathBuf::as_path).collect();

    let Ok(entries) = fs::read_dir(source_dir) else {
        return Vec::new();
    };

    let mut remaining: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| !excluded.contains(p.as_path()))
        .collect();
    remaining.sort();
    remaining
}

/// Recursively delete a download the user has confirmed they no longer need
pub fn purge_source(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|_| MoveError::SourceNotFound {
        path: path.to_path_buf(),
    })?;

    if path.parent().is_none() {
        return Err(MoveError::CleanupFailed {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "refusing to purge a filesystem root"),
        });
    }

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| MoveError::CleanupFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!("Purged {}", path.display());
    Ok(())
}
