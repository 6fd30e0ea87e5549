//! File edit history for deploy.
//!
//! Destructive tools record a file's content before they overwrite it. The
//! history keeps those snapshots on a bounded undo stack and mirrors them
//! onto a redo stack as they are undone.
//!
//! # Example
//!
//! ```no_run
//! use deploy_snapshot::FileHistory;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let history = FileHistory::shared(20);
//! let path = PathBuf::from("/project/a.txt");
//!
//! // Before a tool overwrites the file
//! history.lock().await.push(&path, "old content");
//!
//! // Later, from the /undo command
//! if let Some(restored) = history.lock().await.undo().await? {
//!     println!("Reverted {}", restored.display());
//! }
//! # Ok(())
//! # }
//! ```

mod diff;
mod error;
mod history;
mod snapshot;

pub use diff::{diff_stats, unified_diff, DiffStats};
pub use error::{SnapshotError, SnapshotResult};
pub use history::{FileHistory, SharedFileHistory, DEFAULT_CAPACITY};
pub use snapshot::Snapshot;
