//! In-memory storage implementation for testing.

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory storage. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_to_string(key: &[&str]) -> String {
        key.join("/")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        match data.get(&Self::key_to_string(key)) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("Key cannot be empty"));
        }
        let json = serde_json::to_string(value)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(Self::key_to_string(key), json);

        Ok(())
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(&Self::key_to_string(key));
        Ok(())
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        let prefix_str = Self::key_to_string(prefix);
        let prefix_with_sep = if prefix_str.is_empty() {
            String::new()
        } else {
            format!("{prefix_str}/")
        };

        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        // Direct children only
        let results = data
            .keys()
            .filter_map(|k| {
                let remainder = k.strip_prefix(&prefix_with_sep)?;
                if remainder.contains('/') {
                    return None;
                }
                Some(k.split('/').map(str::to_string).collect())
            })
            .collect();

        Ok(results)
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(&Self::key_to_string(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_remove() {
        let storage = MemoryStorage::new();

        storage.write(&["history", "a"], &vec![1, 2, 3]).await.unwrap();
        let read: Option<Vec<i32>> = storage.read(&["history", "a"]).await.unwrap();
        assert_eq!(read, Some(vec![1, 2, 3]));
        assert!(storage.exists(&["history", "a"]).await.unwrap());

        storage.remove(&["history", "a"]).await.unwrap();
        assert!(storage.is_empty());
        // Removing again is fine
        storage.remove(&["history", "a"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_direct_children_only() {
        let storage = MemoryStorage::new();
        storage.write(&["history", "b"], &1).await.unwrap();
        storage.write(&["history", "a"], &1).await.unwrap();
        storage.write(&["history", "nested", "c"], &1).await.unwrap();
        storage.write(&["other", "d"], &1).await.unwrap();

        let items = storage.list(&["history"]).await.unwrap();
        assert_eq!(items, vec![vec!["history", "a"], vec!["history", "b"]]);
    }

    #[tokio::test]
    async fn test_list_empty_prefix() {
        let storage = MemoryStorage::new();
        storage.write(&["one"], &1).await.unwrap();
        storage.write(&["two"], &2).await.unwrap();
        storage.write(&["dir", "three"], &3).await.unwrap();

        assert_eq!(storage.list(&[]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let storage = MemoryStorage::new();
        assert!(storage.write(&[], &1).await.is_err());
    }
}
