//! Saved conversations.
//!
//! A [`ChatSession`] is generic over its turn type so this crate stays
//! independent of the conversation model; callers pick the concrete turn.

use crate::{Storage, StorageResult};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

/// Key prefix sessions are stored under.
pub const HISTORY_PREFIX: &str = "history";

/// Maximum length of a derived session name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession<T> {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub turns: Vec<T>,
}

impl<T> ChatSession<T> {
    /// Create a session stamped with the current time.
    pub fn new(id: impl Into<String>, name: impl Into<String>, turns: Vec<T>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            date: Utc::now(),
            turns,
        }
    }

    /// Metadata view of this session.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            date: self.date,
        }
    }
}

/// Session metadata, read without decoding the turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Derive a display name from the first user message.
///
/// Whitespace is collapsed and the result cut to [`MAX_NAME_LEN`] characters.
pub fn session_name(first_message: &str) -> String {
    let collapsed = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "New Chat".to_string();
    }
    collapsed.chars().take(MAX_NAME_LEN).collect()
}

/// Sessions stored one document per ID under [`HISTORY_PREFIX`].
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The underlying backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write a session, replacing any previous copy.
    pub async fn save<T: Serialize + Send + Sync>(
        &self,
        session: &ChatSession<T>,
    ) -> StorageResult<()> {
        debug!(session = %session.id, turns = session.turns.len(), "Saving session");
        self.storage
            .write(&[HISTORY_PREFIX, &session.id], session)
            .await
    }

    /// Load a session by ID.
    pub async fn load<T: DeserializeOwned + Send>(
        &self,
        id: &str,
    ) -> StorageResult<Option<ChatSession<T>>> {
        self.storage.read(&[HISTORY_PREFIX, id]).await
    }

    /// Delete a session. Missing sessions are ignored.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.remove(&[HISTORY_PREFIX, id]).await
    }

    /// All sessions, newest first. Documents that fail to parse are skipped.
    pub async fn list(&self) -> StorageResult<Vec<SessionInfo>> {
        let keys = self.storage.list(&[HISTORY_PREFIX]).await?;
        let mut sessions = Vec::with_capacity(keys.len());

        for key in keys {
            let key: Vec<&str> = key.iter().map(String::as_str).collect();
            match self.storage.read::<SessionInfo>(&key).await {
                Ok(Some(info)) => sessions.push(info),
                Ok(None) => {}
                Err(e) => warn!(key = %key.join("/"), error = %e, "Skipping unreadable session"),
            }
        }

        sessions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sessions)
    }

    /// The most recently saved session, if any.
    pub async fn latest(&self) -> StorageResult<Option<SessionInfo>> {
        Ok(self.list().await?.into_iter().next())
    }
}
