use crate::core::auth::Operation;
use crate::core::error::GraphResult;
use crate::core::field::{Document, Key};
use crate::entities::ResourceInstance;
use crate::links::service::LinkService;
use serde_json::Value;
use std::sync::Arc;

/// Live handle on one edge: (source key, link, target key)
#[derive(Clone)]
pub struct LinkInstance {
    service: Arc<LinkService>,
    source: Key,
    target: Key,
}

impl LinkInstance {
    pub(crate) fn new(service: Arc<LinkService>, source: Key, target: Key) -> Self {
        Self {
            service,
            source,
            target,
        }
    }

    pub fn link(&self) -> &str {
        self.service.name()
    }

    pub fn source_key(&self) -> &Key {
        &self.source
    }

    pub fn target_key(&self) -> &Key {
        &self.target
    }

    /// Target key in wire form
    pub fn serialized_target(&self) -> Value {
        self.service.serialize_target(&self.target)
    }

    /// The target resource instance, subject to its discover rule
    pub async fn target(&self) -> GraphResult<ResourceInstance> {
        self.service.target_collection().instance(self.target.clone()).await
    }

    /// Relation payload, read from the master side
    pub async fn data(&self) -> GraphResult<Document> {
        let data = self.service.stored_data(&self.source, &self.target).await?;
        self.service
            .authorize_forward(Operation::View, &self.source, Some(&self.target), Some(&data))?;
        Ok(data)
    }

    pub async fn serialize(&self) -> GraphResult<Value> {
        let data = self.data().await?;
        Ok(self.service.master().declaration.link_schema().serialize(&data))
    }

    /// Merge a partial payload into the stored one
    pub async fn update(&self, raw: &Value) -> GraphResult<()> {
        self.service.update(&self.source, &self.target, raw).await
    }

    pub async fn delete(&self) -> GraphResult<()> {
        self.service.delete(&self.source, &self.target).await
    }
}

impl std::fmt::Debug for LinkInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkInstance")
            .field("link", &self.service.forward.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}
