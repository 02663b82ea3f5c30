//! In-memory implementation of StorageBackend for testing and development

use crate::core::error::StorageError;
use crate::core::field::{Document, Key};
use crate::core::service::{Namespace, StorageBackend};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type Tables = HashMap<Namespace, IndexMap<Key, Document>>;

/// In-memory storage backend
///
/// Keys are kept in insertion order. Filters match documents whose fields
/// equal every filter entry. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is stored, bypassing the engine
    pub fn contains(&self, namespace: &Namespace, key: &Key) -> bool {
        self.tables
            .read()
            .map(|tables| tables.get(namespace).is_some_and(|t| t.contains_key(key)))
            .unwrap_or(false)
    }

    /// Number of keys stored in a namespace
    pub fn len(&self, namespace: &Namespace) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(namespace).map_or(0, IndexMap::len))
            .unwrap_or(0)
    }

    fn matches(data: &Document, filter: &Document) -> bool {
        filter.iter().all(|(name, expected)| data.get(name) == Some(expected))
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn exists(&self, namespace: &Namespace, key: &Key) -> Result<bool, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::LockPoisoned("read"))?;

        Ok(tables.get(namespace).is_some_and(|t| t.contains_key(key)))
    }

    async fn get(&self, namespace: &Namespace, key: &Key) -> Result<Option<Document>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::LockPoisoned("read"))?;

        Ok(tables.get(namespace).and_then(|t| t.get(key)).cloned())
    }

    async fn put(&self, namespace: &Namespace, key: &Key, data: Document) -> Result<(), StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::LockPoisoned("write"))?;

        tables
            .entry(namespace.clone())
            .or_default()
            .insert(key.clone(), data);

        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, key: &Key) -> Result<(), StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::LockPoisoned("write"))?;

        if let Some(table) = tables.get_mut(namespace) {
            table.shift_remove(key);
            if table.is_empty() {
                tables.remove(namespace);
            }
        }

        Ok(())
    }

    async fn list_keys(&self, namespace: &Namespace, filter: &Document) -> Result<Vec<Key>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::LockPoisoned("read"))?;

        Ok(tables
            .get(namespace)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, data)| Self::matches(data, filter))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, namespace: &Namespace, data: Document) -> Result<Key, StorageError> {
        let key = Key::Uuid(Uuid::new_v4());
        self.put(namespace, &key, data).await?;
        Ok(key)
    }
}
