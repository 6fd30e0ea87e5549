//! Snapshot data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The content of one file at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Absolute path of the file.
    pub path: PathBuf,

    /// File content when the snapshot was taken.
    pub content: String,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Create a new snapshot stamped with the current time.
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
