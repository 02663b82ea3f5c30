use crate::core::auth::{AccessRequest, Operation};
use crate::core::error::{GraphError, GraphResult};
use crate::core::field::{Document, Key};
use crate::core::resource::ResourceDeclaration;
use crate::core::schema::DeserializeOptions;
use crate::core::service::Namespace;
use crate::entities::instance::ResourceInstance;
use crate::links::LinkHolder;
use crate::links::registry::ResourceNode;
use crate::server::entry_point::EntryPoint;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Root accessor of a resource type, bound to a caller
#[derive(Clone)]
pub struct RootResourceCollection {
    entry: EntryPoint,
    node: Arc<ResourceNode>,
}

impl RootResourceCollection {
    pub(crate) fn new(entry: EntryPoint, node: Arc<ResourceNode>) -> Self {
        Self { entry, node }
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn declaration(&self) -> &ResourceDeclaration {
        &self.node.declaration
    }

    fn namespace(&self) -> Namespace {
        Namespace::resource(self.node.name())
    }

    /// Fetch an instance by caller-supplied key
    ///
    /// Undecodable keys, absent instances and instances the caller may not
    /// discover all look the same: NotFound.
    pub async fn get(&self, raw_key: &Value) -> GraphResult<ResourceInstance> {
        let declaration = &self.node.declaration;
        let key = declaration
            .policy()
            .deserialize(declaration.resource_schema(), raw_key)
            .map_err(|e| GraphError::not_found(format!("PK validation failed: {e}")))?;
        self.instance(key).await
    }

    pub async fn instance(&self, key: Key) -> GraphResult<ResourceInstance> {
        let found = self.entry.storage.exists(&self.namespace(), &key).await?;
        if !found || !self.entry.can_discover(&self.node, &key) {
            return Err(GraphError::not_found(format!(
                "{} {key} not found",
                self.node.name()
            )));
        }
        Ok(self.detached_instance(key))
    }

    /// Handle without existence or discover checks
    pub(crate) fn detached_instance(&self, key: Key) -> ResourceInstance {
        ResourceInstance::new(self.entry.clone(), self.node.clone(), key)
    }

    /// Create an instance together with its initial links
    ///
    /// `links` maps link names to link payloads; see [`LinkHolder`].
    pub async fn create(&self, data: &Value, links: &Value) -> GraphResult<ResourceInstance> {
        let declaration = &self.node.declaration;
        let schema = declaration.resource_schema();
        let mut document = schema.deserialize(data)?;

        let request = AccessRequest::new(&self.entry.caller, Operation::Create, self.node.name())
            .data(Some(&document));
        declaration.access_rules().require(&request)?;

        let readonly: Vec<String> = schema
            .readonly_fields()
            .into_iter()
            .filter(|name| document.contains_key(name))
            .collect();
        if !readonly.is_empty() {
            return Err(GraphError::validation(format!(
                "Readonly fields can not be set: {}",
                readonly.join(", ")
            )));
        }

        let pending = LinkHolder::validate(&self.entry, &self.node, links).await?;

        let storage = &self.entry.storage;
        let namespace = self.namespace();
        let policy = declaration.policy();
        let key = match policy.generate(schema, &document) {
            Some(key) => {
                if storage.exists(&namespace, &key).await? {
                    return Err(GraphError::conflict(format!(
                        "{} with key {key} already exists",
                        self.node.name()
                    )));
                }
                policy.assign(schema, &mut document, &key);
                storage.put(&namespace, &key, document).await?;
                key
            }
            None => storage.insert(&namespace, document).await?,
        };

        for (service, link) in pending {
            service.attach(&key, &link.target, link.data).await?;
        }

        tracing::debug!(resource = %self.node.name(), key = %key, "created resource");
        Ok(self.detached_instance(key))
    }

    /// Instances matching filter parameters
    ///
    /// Parameters are read against the query schema; invalid ones are ignored.
    pub async fn filter(&self, params: &Value) -> GraphResult<ResourceCollection> {
        let declaration = &self.node.declaration;
        let request = AccessRequest::new(&self.entry.caller, Operation::List, self.node.name());
        declaration.access_rules().require(&request)?;

        let filter = match params {
            Value::Null => Document::new(),
            raw => declaration
                .resource_query_schema()
                .deserialize_with(raw, DeserializeOptions::lenient())?,
        };

        Ok(ResourceCollection {
            entry: self.entry.clone(),
            node: self.node.clone(),
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

    pub async fn items(&self) -> GraphResult<Vec<Option<ResourceInstance>>> {
        self.filter(&Value::Null).await?.items().await
    }

    pub async fn serialize(&self) -> GraphResult<Vec<Value>> {
        self.filter(&Value::Null).await?.serialize().await
    }
}

/// Filtered view over a resource type
///
/// The key list is fetched once per handle; later writes are not reflected.
pub struct ResourceCollection {
    entry: EntryPoint,
    node: Arc<ResourceNode>,
    filter: Document,
    keys: OnceCell<Vec<Key>>,
}

impl ResourceCollection {
    pub fn filter_params(&self) -> &Document {
        &self.filter
    }

    pub async fn keys(&self) -> GraphResult<&[Key]> {
        let namespace = Namespace::resource(self.node.name());
        self.keys
            .get_or_try_init(|| async {
                Ok::<_, GraphError>(self.entry.storage.list_keys(&namespace, &self.filter).await?)
            })
            .await
            .map(Vec::as_slice)
    }

    pub async fn count(&self) -> GraphResult<u64> {
        let namespace = Namespace::resource(self.node.name());
        Ok(self.entry.storage.count(&namespace, &self.filter).await?)
    }

    /// Instances the caller may not discover are kept as `None`
    pub async fn items(&self) -> GraphResult<Vec<Option<ResourceInstance>>> {
        Ok(self
            .keys()
            .await?
            .iter()
            .map(|key| {
                self.entry
                    .can_discover(&self.node, key)
                    .then(|| ResourceInstance::new(self.entry.clone(), self.node.clone(), key.clone()))
            })
            .collect())
    }

    pub async fn serialize(&self) -> GraphResult<Vec<Value>> {
        Ok(self
            .items()
            .await?
            .iter()
            .map(|item| item.as_ref().map_or(Value::Null, ResourceInstance::serialized_key))
            .collect())
    }
}
