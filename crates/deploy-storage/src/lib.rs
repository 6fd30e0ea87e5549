//! Chat session persistence for deploy.
//!
//! This crate provides a key-value storage abstraction with two backends:
//! - JSON file storage rooted at the data directory (default)
//! - In-memory storage (for testing)
//!
//! [`SessionStore`] layers saved conversations on top of any backend, one
//! document per session under the `history` prefix.

pub mod error;
pub mod json;
pub mod memory;
pub mod session;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;
pub use session::{session_name, ChatSession, SessionInfo, SessionStore};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A trait for key-value storage backends.
///
/// Keys are represented as path segments, e.g., `["history", "ses_01J..."]`.
/// Values are serialized/deserialized as JSON.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Write a value to storage, replacing any previous value.
    async fn write<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// Remove a value from storage. Removing a missing key is not an error.
    async fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// List the keys directly under a prefix.
    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>>;

    /// Check if a key exists.
    async fn exists(&self, key: &[&str]) -> StorageResult<bool>;
}
