// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Key-value stores backing the local repositories.
//!
//! `InMemoryKeyValueStore` is used by tests and short-lived sessions.
//! `JsonFileKeyValueStore` keeps every key in one JSON object on disk so the
//! CLI can inspect and purge locally held meta-transactions between runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::repository::{KeyValueStore, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), RepositoryError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Single-file JSON store. Writes go to a sibling temp file and are renamed
/// into place, so a crash never leaves a half-written store behind.
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileKeyValueStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, RepositoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = ?self.path, keys = entries.len(), "Persisted key-value store");
        Ok(())
    }

    pub async fn keys(&self) -> Result<Vec<String>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        store.delete("a").await.unwrap();
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileKeyValueStore::new(&path);
        store.set("vaultguard.tokens.x", "[]".to_string()).await.unwrap();
        store.set("other", "{}".to_string()).await.unwrap();
        drop(store);

        let reopened = JsonFileKeyValueStore::new(&path);
        assert_eq!(reopened.get("vaultguard.tokens.x").await.unwrap().as_deref(), Some("[]"));
        reopened.delete("other").await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["vaultguard.tokens.x".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileKeyValueStore::new(&path);
        assert!(matches!(store.get("k").await, Err(RepositoryError::Serialization(_))));
    }
}
