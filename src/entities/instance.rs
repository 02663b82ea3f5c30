use crate::core::auth::{AccessRequest, Operation};
use crate::core::error::{GraphError, GraphResult};
use crate::core::field::{Document, Key};
use crate::core::schema::DeserializeOptions;
use crate::core::service::Namespace;
use crate::entities::Visited;
use crate::links::LinkHolder;
use crate::links::registry::ResourceNode;
use crate::server::entry_point::EntryPoint;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

/// Live handle on one resource instance
///
/// Holds nothing but the key; every call reads the backend afresh.
#[derive(Clone)]
pub struct ResourceInstance {
    entry: EntryPoint,
    node: Arc<ResourceNode>,
    key: Key,
}

impl ResourceInstance {
    pub(crate) fn new(entry: EntryPoint, node: Arc<ResourceNode>, key: Key) -> Self {
        Self { entry, node, key }
    }

    pub fn resource(&self) -> &str {
        self.node.name()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn into_key(self) -> Key {
        self.key
    }

    /// Key in wire form, as the key policy renders it
    pub fn serialized_key(&self) -> Value {
        let declaration = &self.node.declaration;
        declaration
            .policy()
            .serialize(declaration.resource_schema(), &self.key)
    }

    fn namespace(&self) -> Namespace {
        Namespace::resource(self.node.name())
    }

    async fn stored(&self) -> GraphResult<Document> {
        self.entry
            .storage
            .get(&self.namespace(), &self.key)
            .await?
            .ok_or_else(|| GraphError::not_found(format!("{} {} not found", self.resource(), self.key)))
    }

    /// Stored data, subject to the view rule
    pub async fn data(&self) -> GraphResult<Document> {
        let stored = self.stored().await?;
        let request = AccessRequest::new(&self.entry.caller, Operation::View, self.node.name())
            .key(Some(&self.key))
            .data(Some(&stored));
        self.node.declaration.access_rules().require(&request)?;
        Ok(stored)
    }

    pub async fn serialize(&self) -> GraphResult<Value> {
        let data = self.data().await?;
        Ok(self.node.declaration.resource_schema().serialize(&data))
    }

    /// Partial update; defaults are not re-applied
    pub async fn update(&self, raw: &Value) -> GraphResult<()> {
        let schema = self.node.declaration.resource_schema();
        let changes = schema.deserialize_with(raw, DeserializeOptions::partial())?;

        let request = AccessRequest::new(&self.entry.caller, Operation::Update, self.node.name())
            .key(Some(&self.key))
            .data(Some(&changes));
        self.node.declaration.access_rules().require(&request)?;

        let blocked: Vec<String> = schema
            .unchangeable_fields()
            .into_iter()
            .filter(|name| changes.contains_key(name))
            .collect();
        if !blocked.is_empty() {
            return Err(GraphError::validation(format!(
                "Unchangeable fields: {}",
                blocked.join(", ")
            )));
        }

        let mut stored = self.stored().await?;
        stored.extend(changes);
        self.entry.storage.put(&self.namespace(), &self.key, stored).await?;

        tracing::debug!(resource = %self.resource(), key = %self.key, "updated resource");
        Ok(())
    }

    /// Delete the instance and clear its links
    pub async fn delete(&self) -> GraphResult<()> {
        let request = AccessRequest::new(&self.entry.caller, Operation::Delete, self.node.name())
            .key(Some(&self.key));
        self.node.declaration.access_rules().require(&request)?;

        self.purge(&mut Visited::new()).await?;
        tracing::debug!(resource = %self.resource(), key = %self.key, "deleted resource");
        Ok(())
    }

    /// Unchecked delete, shared by caller deletes and cascades
    pub(crate) fn purge<'a>(&'a self, visited: &'a mut Visited) -> BoxFuture<'a, GraphResult<()>> {
        async move {
            if !visited.insert((self.node.name().to_string(), self.key.clone())) {
                return Ok(());
            }
            self.links().clear(visited).await?;
            self.entry.storage.delete(&self.namespace(), &self.key).await?;
            Ok(())
        }
        .boxed()
    }

    pub fn links(&self) -> LinkHolder {
        LinkHolder::new(self.entry.clone(), self.node.clone(), self.key.clone())
    }
}

impl std::fmt::Debug for ResourceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceInstance")
            .field("resource", &self.node.name())
            .field("key", &self.key)
            .finish()
    }
}
