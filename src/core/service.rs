//! Storage backend interface
//!
//! The graph engine owns no persistence. Every read and write goes through a
//! [`StorageBackend`], addressed by [`Namespace`]: one namespace per resource
//! type, and one per (source instance, link) pair.

use crate::core::error::StorageError;
use crate::core::field::{Document, Key};
use async_trait::async_trait;
use std::fmt;

/// Address of a keyed collection in the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Instances of a resource type, keyed by primary key
    Resource { resource: String },

    /// Link entries of one source instance, keyed by target key
    Link { source: Key, link: String },
}

impl Namespace {
    pub fn resource(resource: impl Into<String>) -> Self {
        Namespace::Resource {
            resource: resource.into(),
        }
    }

    /// `link` is the qualified link name (`Source:link`)
    pub fn link(source: Key, link: impl Into<String>) -> Self {
        Namespace::Link {
            source,
            link: link.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Resource { resource } => write!(f, "{resource}"),
            Namespace::Link { source, link } => write!(f, "{link}[{source}]"),
        }
    }
}

/// Storage trait consumed by the graph engine
///
/// Implementations provide keyed document storage per namespace. Filters are
/// opaque to the engine: they are the validated query parameters of the
/// resource or link being listed.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Check whether a key is present
    async fn exists(&self, namespace: &Namespace, key: &Key) -> Result<bool, StorageError>;

    /// Fetch the document stored under a key
    async fn get(&self, namespace: &Namespace, key: &Key) -> Result<Option<Document>, StorageError>;

    /// Store a document, replacing any previous one
    async fn put(&self, namespace: &Namespace, key: &Key, data: Document) -> Result<(), StorageError>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, namespace: &Namespace, key: &Key) -> Result<(), StorageError>;

    /// Keys matching the filter
    async fn list_keys(&self, namespace: &Namespace, filter: &Document) -> Result<Vec<Key>, StorageError>;

    /// Number of keys matching the filter
    async fn count(&self, namespace: &Namespace, filter: &Document) -> Result<u64, StorageError> {
        Ok(self.list_keys(namespace, filter).await?.len() as u64)
    }

    /// Store a document under a backend-generated key
    async fn insert(&self, _namespace: &Namespace, _data: Document) -> Result<Key, StorageError> {
        Err(StorageError::Unsupported("key generation"))
    }
}
