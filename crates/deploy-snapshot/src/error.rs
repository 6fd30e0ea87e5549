//! Snapshot error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while undoing or redoing a change.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Reading the file's current content failed.
    #[error("Failed to read {}: {source}", .path.display())]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the snapshot back to disk failed.
    #[error("Failed to restore {}: {source}", .path.display())]
    Restore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// The file the failed operation targeted.
    pub fn path(&self) -> &PathBuf {
        match self {
            SnapshotError::Capture { path, .. } | SnapshotError::Restore { path, .. } => path,
        }
    }
}
