use crate::core::auth::Operation;
use crate::core::error::{GraphError, GraphResult};
use crate::core::field::{Document, Key};
use crate::core::schema::DeserializeOptions;
use crate::links::instance::LinkInstance;
use crate::links::service::LinkService;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Accessor for a link of cardinality MANY
#[derive(Clone)]
pub struct RootLinkCollection {
    service: Arc<LinkService>,
    source: Key,
}

impl RootLinkCollection {
    pub(crate) fn new(service: Arc<LinkService>, source: Key) -> Self {
        Self { service, source }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn source_key(&self) -> &Key {
        &self.source
    }

    /// Look up the edge pointing at a caller-supplied target key
    pub async fn get(&self, raw_target: &Value) -> GraphResult<LinkInstance> {
        let target = self.service.decode_target(raw_target)?;
        self.instance(target).await
    }

    pub async fn instance(&self, target: Key) -> GraphResult<LinkInstance> {
        if !self.service.exists(&self.source, &target).await?
            || !self.service.can_discover(&self.source, &target)
        {
            return Err(GraphError::not_found("Link not found"));
        }
        Ok(LinkInstance::new(self.service.clone(), self.source.clone(), target))
    }

    /// Attach a new target; the payload carries `@target` plus link data
    pub async fn create(&self, raw: &Value) -> GraphResult<LinkInstance> {
        let link = self.service.validate(Some(&self.source), raw, true).await?;
        self.service.attach(&self.source, &link.target, link.data).await?;
        Ok(LinkInstance::new(self.service.clone(), self.source.clone(), link.target))
    }

    /// Entries matching the link's query parameters
    pub async fn filter(&self, params: &Value) -> GraphResult<LinkCollection> {
        self.service
            .authorize_forward(Operation::List, &self.source, None, None)?;

        let filter = match params {
            Value::Null => Document::new(),
            raw => self
                .service
                .declaration()
                .link_query_schema()
                .deserialize_with(raw, DeserializeOptions::lenient())?,
        };

        Ok(LinkCollection {
            service: self.service.clone(),
            source: self.source.clone(),
            filter,
            keys: OnceCell::new(),
        })
    }

    pub async fn keys(&self) -> GraphResult<Vec<Key>> {
        Ok(self.filter(&Value::Null).await?.keys().await?.to_vec())
    }

    pub async fn count(&self) -> GraphResult<u64> {
        self.filter(&Value::Null).await?.count().await
    }

    pub async fn items(&self) -> GraphResult<Vec<Option<LinkInstance>>> {
        self.filter(&Value::Null).await?.items().await
    }

    pub async fn serialize(&self) -> GraphResult<Vec<Value>> {
        self.filter(&Value::Null).await?.serialize().await
    }
}

/// Filtered view over the edges of one source instance
///
/// Keys are fetched once, on first use, and never refreshed.
pub struct LinkCollection {
    service: Arc<LinkService>,
    source: Key,
    filter: Document,
    keys: OnceCell<Vec<Key>>,
}

impl LinkCollection {
    pub fn filter_params(&self) -> &Document {
        &self.filter
    }

    pub async fn keys(&self) -> GraphResult<&[Key]> {
        self.keys
            .get_or_try_init(|| self.service.keys(&self.source, &self.filter))
            .await
            .map(Vec::as_slice)
    }

    pub async fn count(&self) -> GraphResult<u64> {
        self.service.count(&self.source, &self.filter).await
    }

    /// One entry per key; entries the caller may not discover are `None`
    pub async fn items(&self) -> GraphResult<Vec<Option<LinkInstance>>> {
        Ok(self
            .keys()
            .await?
            .iter()
            .map(|target| {
                self.service.can_discover(&self.source, target).then(|| {
                    LinkInstance::new(self.service.clone(), self.source.clone(), target.clone())
                })
            })
            .collect())
    }

    /// Target keys in wire form, `null` for hidden entries
    pub async fn serialize(&self) -> GraphResult<Vec<Value>> {
        Ok(self
            .items()
            .await?
            .iter()
            .map(|item| item.as_ref().map_or(Value::Null, LinkInstance::serialized_target))
            .collect())
    }
}
