use crate::core::error::{GraphError, GraphResult};
use crate::core::field::{Document, Key};
use crate::links::instance::LinkInstance;
use crate::links::service::{LinkService, Mutation};
use serde_json::Value;
use std::sync::Arc;

/// Accessor for a link of cardinality ONE
#[derive(Clone)]
pub struct LinkToOne {
    service: Arc<LinkService>,
    source: Key,
}

impl LinkToOne {
    pub(crate) fn new(service: Arc<LinkService>, source: Key) -> Self {
        Self { service, source }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn source_key(&self) -> &Key {
        &self.source
    }

    /// Key of the linked target, if any
    ///
    /// More than one stored entry means the backend is corrupted.
    pub async fn current(&self) -> GraphResult<Option<Key>> {
        let mut keys = self.service.keys(&self.source, &Document::new()).await?;
        match keys.len() {
            0 | 1 => Ok(keys.pop()),
            found => {
                let link = self.service.declaration().qualified_name();
                tracing::warn!(link = %link, source = %self.source, found, "multiple entries in ONE link");
                Err(GraphError::MultipleFound(format!(
                    "{found} links found for {link} of {}",
                    self.source
                )))
            }
        }
    }

    /// The linked instance; `None` when empty or not discoverable
    pub async fn item(&self) -> GraphResult<Option<LinkInstance>> {
        Ok(self.current().await?.and_then(|target| {
            self.service
                .can_discover(&self.source, &target)
                .then(|| LinkInstance::new(self.service.clone(), self.source.clone(), target))
        }))
    }

    pub async fn get(&self) -> GraphResult<LinkInstance> {
        self.item()
            .await?
            .ok_or_else(|| GraphError::not_found(format!("Link {} is not set", self.name())))
    }

    /// Point the slot at a new target, replacing the current edge
    pub async fn set(&self, raw: &Value) -> GraphResult<LinkInstance> {
        let previous = self.current().await?;
        let link = self.service.validate(Some(&self.source), raw, false).await?;

        match previous {
            Some(previous) if previous != link.target => {
                self.service.replace(&self.source, &previous).await?;
            }
            // same target: the payload is rewritten in place
            Some(_) => self.service.gate(Mutation::Update)?,
            None => {}
        }

        self.service.attach(&self.source, &link.target, link.data).await?;
        Ok(LinkInstance::new(self.service.clone(), self.source.clone(), link.target))
    }

    pub async fn update(&self, raw: &Value) -> GraphResult<()> {
        self.get().await?.update(raw).await
    }

    pub async fn delete(&self) -> GraphResult<()> {
        self.get().await?.delete().await
    }
}
