//! Bounded undo/redo stacks over whole-file snapshots.

use crate::{Snapshot, SnapshotError, SnapshotResult};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Number of snapshots kept on the undo stack by default.
pub const DEFAULT_CAPACITY: usize = 20;

/// History shared between tools and command handlers.
pub type SharedFileHistory = Arc<Mutex<FileHistory>>;

/// Session-wide file edit history.
///
/// The history is keyed to the session, not to individual files: `undo`
/// always reverts the most recent recorded change, whichever file it
/// touched.
#[derive(Debug)]
pub struct FileHistory {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    capacity: usize,
}

impl Default for FileHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FileHistory {
    /// Create an empty history holding at most `capacity` undo entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Create an empty history wrapped for sharing.
    pub fn shared(capacity: usize) -> SharedFileHistory {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Record `content` as the state of `path` before a mutation.
    ///
    /// Clears the redo stack and evicts the oldest entry once the undo
    /// stack exceeds its capacity.
    pub fn push(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let snapshot = Snapshot::new(path, content);
        debug!(path = %snapshot.path.display(), "Recording file snapshot");

        self.undo.push_back(snapshot);
        self.redo.clear();

        while self.undo.len() > self.capacity {
            if let Some(evicted) = self.undo.pop_front() {
                debug!(path = %evicted.path.display(), "Evicting oldest snapshot");
            }
        }
    }

    /// Revert the most recent change.
    ///
    /// The entry is consumed even when the disk work fails, so a broken
    /// snapshot never hides the older ones beneath it. Returns the affected
    /// path, or `None` when there is nothing to undo.
    pub async fn undo(&mut self) -> SnapshotResult<Option<PathBuf>> {
        let Some(snapshot) = self.undo.pop_back() else {
            return Ok(None);
        };
        let current = swap_in(&snapshot).await?;

        info!(path = %snapshot.path.display(), "Undid file change");
        self.redo.push(Snapshot::new(snapshot.path.clone(), current));
        Ok(Some(snapshot.path))
    }

    /// Re-apply the most recently undone change.
    ///
    /// Returns the affected path, or `None` when there is nothing to redo.
    pub async fn redo(&mut self) -> SnapshotResult<Option<PathBuf>> {
        let Some(snapshot) = self.redo.pop() else {
            return Ok(None);
        };
        let current = swap_in(&snapshot).await?;

        info!(path = %snapshot.path.display(), "Redid file change");
        self.undo.push_back(Snapshot::new(snapshot.path.clone(), current));
        Ok(Some(snapshot.path))
    }

    /// Number of entries that can be undone.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of entries that can be redone.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Maximum number of undo entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all recorded snapshots.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

/// Write `snapshot` to disk and return the content it replaced.
///
/// A file deleted since the snapshot was taken reads as empty and is
/// recreated, parent directories included.
async fn swap_in(snapshot: &Snapshot) -> SnapshotResult<String> {
    let current = match fs::read_to_string(&snapshot.path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(SnapshotError::Capture {
                path: snapshot.path.clone(),
                source,
            })
        }
    };

    let restore = |source| SnapshotError::Restore {
        path: snapshot.path.clone(),
        source,
    };
    if let Some(parent) = snapshot.path.parent() {
        fs::create_dir_all(parent).await.map_err(restore)?;
    }
    fs::write(&snapshot.path, &snapshot.content)
        .await
        .map_err(restore)?;

    Ok(current)
}
