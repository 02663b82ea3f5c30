//! Storage-level link operations
//!
//! A [`LinkService`] binds one declared link (the forward side, as seen by
//! the caller) to an entry point. Payload reads and writes always go to the
//! master side; the other side only holds empty existence markers.

use crate::core::auth::{AccessRequest, Operation};
use crate::core::error::{GraphError, GraphResult, ValidationError};
use crate::core::field::{Document, Key};
use crate::core::link::{Cardinality, LinkDeclaration};
use crate::core::schema::DeserializeOptions;
use crate::core::service::Namespace;
use crate::entities::{RootResourceCollection, Visited};
use crate::links::registry::{LinkNode, ResourceNode};
use crate::server::entry_point::EntryPoint;
use serde_json::Value;
use std::sync::Arc;

/// Payload key naming the target instance of a link
pub const TARGET_KEY: &str = "@target";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Create,
    Update,
    Delete,
}

/// A validated link payload, ready to be attached
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub target: Key,
    pub data: Document,
}

pub struct LinkService {
    pub(crate) entry: EntryPoint,
    pub(crate) forward: Arc<LinkNode>,
    pub(crate) backward: Option<Arc<LinkNode>>,
    pub(crate) target: Arc<ResourceNode>,
}

impl LinkService {
    pub(crate) fn new(entry: EntryPoint, forward: Arc<LinkNode>) -> GraphResult<Self> {
        let backward = entry.topology.mirror(&forward).cloned();
        let target = entry.node(forward.declaration.target())?;
        Ok(Self {
            entry,
            forward,
            backward,
            target,
        })
    }

    pub fn declaration(&self) -> &LinkDeclaration {
        &self.forward.declaration
    }

    pub fn name(&self) -> &str {
        self.forward.declaration.name()
    }

    fn forward_is_master(&self) -> bool {
        self.forward.declaration.is_master() || self.backward.is_none()
    }

    /// The side owning the payload
    pub(crate) fn master(&self) -> &LinkNode {
        match &self.backward {
            Some(backward) if !self.forward_is_master() => backward,
            _ => &self.forward,
        }
    }

    pub(crate) fn forward_namespace(&self, source: &Key) -> Namespace {
        Namespace::link(source.clone(), self.forward.declaration.qualified_name())
    }

    fn backward_namespace(&self, target: &Key) -> Option<Namespace> {
        self.backward
            .as_ref()
            .map(|backward| Namespace::link(target.clone(), backward.declaration.qualified_name()))
    }

    /// Namespace and key holding the payload of the (source, target) edge
    fn master_slot(&self, source: &Key, target: &Key) -> (Namespace, Key) {
        match self.backward_namespace(target) {
            Some(namespace) if !self.forward_is_master() => (namespace, source.clone()),
            _ => (self.forward_namespace(source), target.clone()),
        }
    }

    // ---- checks ---------------------------------------------------------

    /// Readonly links reject every mutation; unchangeable ones only allow creation
    pub(crate) fn gate(&self, mutation: Mutation) -> GraphResult<()> {
        let sides = std::iter::once(("forward", &self.forward))
            .chain(self.backward.iter().map(|backward| ("backward", backward)));

        for (side, node) in sides {
            if node.declaration.is_readonly() {
                return Err(GraphError::forbidden(format!(
                    "Link {} can not be modified ({side} link is readonly)",
                    self.forward.declaration.qualified_name()
                )));
            }
            if !node.declaration.is_changeable() && mutation != Mutation::Create {
                return Err(GraphError::forbidden(format!(
                    "Link {} can not be modified ({side} link is unchangeable)",
                    self.forward.declaration.qualified_name()
                )));
            }
        }
        Ok(())
    }

    /// Removing an edge would empty a required ONE slot on either side
    fn guard_required(&self) -> GraphResult<()> {
        let required = self.forward.declaration.is_required_one()
            || self
                .backward
                .as_ref()
                .is_some_and(|backward| backward.declaration.is_required_one());
        if required {
            return Err(GraphError::forbidden("It is forbidden to remove required links"));
        }
        Ok(())
    }

    /// Reads are authorized by the invoking side
    pub(crate) fn authorize_forward(
        &self,
        operation: Operation,
        source: &Key,
        target: Option<&Key>,
        data: Option<&Document>,
    ) -> GraphResult<()> {
        let subject = self.forward.declaration.qualified_name();
        let request = AccessRequest::new(&self.entry.caller, operation, &subject)
            .key(Some(source))
            .related_key(target)
            .data(data);
        self.forward.declaration.access_rules().require(&request)
    }

    /// Writes are authorized by the master side, with keys as the master sees them
    pub(crate) fn authorize_master(
        &self,
        operation: Operation,
        source: Option<&Key>,
        target: &Key,
        data: Option<&Document>,
    ) -> GraphResult<()> {
        let master = self.master();
        let (key, related) = if self.forward_is_master() {
            (source, Some(target))
        } else {
            (Some(target), source)
        };
        let subject = master.declaration.qualified_name();
        let request = AccessRequest::new(&self.entry.caller, operation, &subject)
            .key(key)
            .related_key(related)
            .data(data);
        master.declaration.access_rules().require(&request)
    }

    /// Both the edge and its target must be discoverable
    pub(crate) fn can_discover(&self, source: &Key, target: &Key) -> bool {
        let subject = self.forward.declaration.qualified_name();
        let request = AccessRequest::new(&self.entry.caller, Operation::Discover, &subject)
            .key(Some(source))
            .related_key(Some(target));
        self.forward.declaration.access_rules().check(&request)
            && self.entry.can_discover(&self.target, target)
    }

    // ---- keys -----------------------------------------------------------

    /// Decode a caller-supplied target key
    pub(crate) fn decode_target(&self, raw: &Value) -> GraphResult<Key> {
        let declaration = &self.target.declaration;
        declaration
            .policy()
            .deserialize(declaration.resource_schema(), raw)
            .map_err(|e| GraphError::not_found(format!("PK validation failed: {e}")))
    }

    pub(crate) fn serialize_target(&self, key: &Key) -> Value {
        let declaration = &self.target.declaration;
        declaration.policy().serialize(declaration.resource_schema(), key)
    }

    pub(crate) fn target_collection(&self) -> RootResourceCollection {
        RootResourceCollection::new(self.entry.clone(), self.target.clone())
    }

    // ---- storage --------------------------------------------------------

    pub(crate) async fn exists(&self, source: &Key, target: &Key) -> GraphResult<bool> {
        Ok(self.entry.storage.exists(&self.forward_namespace(source), target).await?)
    }

    pub(crate) async fn keys(&self, source: &Key, filter: &Document) -> GraphResult<Vec<Key>> {
        Ok(self.entry.storage.list_keys(&self.forward_namespace(source), filter).await?)
    }

    pub(crate) async fn count(&self, source: &Key, filter: &Document) -> GraphResult<u64> {
        Ok(self.entry.storage.count(&self.forward_namespace(source), filter).await?)
    }

    /// Payload stored at the master side
    pub(crate) async fn stored_data(&self, source: &Key, target: &Key) -> GraphResult<Document> {
        let (namespace, key) = self.master_slot(source, target);
        self.entry
            .storage
            .get(&namespace, &key)
            .await?
            .ok_or_else(|| GraphError::not_found("Link not found"))
    }

    /// Check a link payload before anything is written
    ///
    /// `source` is `None` while the source instance is being created. The
    /// conflict check is skipped when `check_conflict` is false.
    pub(crate) async fn validate(
        &self,
        source: Option<&Key>,
        raw: &Value,
        check_conflict: bool,
    ) -> GraphResult<PendingLink> {
        self.gate(Mutation::Create)?;

        if let Some(backward) = &self.backward {
            if self.forward.declaration.cardinality() == Cardinality::Many
                && backward.declaration.cardinality() == Cardinality::One
            {
                return Err(GraphError::forbidden(format!(
                    "Creating one to many links from the many side is forbidden, use {}",
                    backward.declaration.qualified_name()
                )));
            }
        }

        let Value::Object(map) = raw else {
            return Err(GraphError::validation("Has to be a dict"));
        };
        let mut payload = map.clone();
        let raw_target = payload
            .remove(TARGET_KEY)
            .filter(|value| !value.is_null())
            .ok_or_else(|| GraphError::validation("Target is not defined"))?;

        let target = match self.target_collection().get(&raw_target).await {
            Ok(instance) => instance.into_key(),
            Err(GraphError::NotFound(message)) => {
                return Err(ValidationError::message(message).prefixed("Target").into());
            }
            Err(e) => return Err(e),
        };

        let schema = self.master().declaration.link_schema();
        let data = schema.deserialize(&Value::Object(payload.clone()))?;
        self.authorize_master(Operation::Create, source, &target, Some(&data))?;

        if let Some(source) = source {
            if check_conflict && self.exists(source, &target).await? {
                return Err(GraphError::conflict("Link already exists"));
            }
        }

        // ONE on the target side: the target may be linked to a single source
        if let Some(backward) = &self.backward {
            if backward.declaration.cardinality() == Cardinality::One {
                let namespace = Namespace::link(target.clone(), backward.declaration.qualified_name());
                let linked = self.entry.storage.list_keys(&namespace, &Document::new()).await?;
                if linked.iter().any(|key| Some(key) != source) {
                    return Err(GraphError::conflict(format!(
                        "Target {target} is already linked through {}",
                        backward.declaration.qualified_name()
                    )));
                }
            }
        }

        let readonly: Vec<String> = schema
            .readonly_fields()
            .into_iter()
            .filter(|name| payload.contains_key(name))
            .collect();
        if !readonly.is_empty() {
            return Err(GraphError::validation(format!(
                "Readonly fields can not be set: {}",
                readonly.join(", ")
            )));
        }

        Ok(PendingLink { target, data })
    }

    /// Store the payload at the master and a marker at the slave
    pub(crate) async fn attach(&self, source: &Key, target: &Key, data: Document) -> GraphResult<()> {
        let (forward_data, backward_data) = if self.forward_is_master() {
            (data, Document::new())
        } else {
            (Document::new(), data)
        };

        let storage = &self.entry.storage;
        storage.put(&self.forward_namespace(source), target, forward_data).await?;
        if let Some(namespace) = self.backward_namespace(target) {
            storage.put(&namespace, source, backward_data).await?;
        }

        tracing::debug!(
            link = %self.forward.id,
            source = %source,
            target = %target,
            "attached link"
        );
        Ok(())
    }

    /// Remove both sides of an edge, without any checks
    pub(crate) async fn detach(&self, source: &Key, target: &Key) -> GraphResult<()> {
        let storage = &self.entry.storage;
        storage.delete(&self.forward_namespace(source), target).await?;
        if let Some(namespace) = self.backward_namespace(target) {
            storage.delete(&namespace, source).await?;
        }

        tracing::debug!(
            link = %self.forward.id,
            source = %source,
            target = %target,
            "detached link"
        );
        Ok(())
    }

    /// Partial update of the master payload
    pub(crate) async fn update(&self, source: &Key, target: &Key, raw: &Value) -> GraphResult<()> {
        self.gate(Mutation::Update)?;

        let schema = self.master().declaration.link_schema();
        let changes = schema.deserialize_with(raw, DeserializeOptions::partial())?;
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

        self.authorize_master(Operation::Update, Some(source), target, Some(&changes))?;

        let (namespace, key) = self.master_slot(source, target);
        let mut stored = self
            .entry
            .storage
            .get(&namespace, &key)
            .await?
            .ok_or_else(|| GraphError::not_found("Link not found"))?;
        stored.extend(changes);
        self.entry.storage.put(&namespace, &key, stored).await?;

        tracing::debug!(link = %self.forward.id, source = %source, target = %target, "updated link");
        Ok(())
    }

    /// Caller-initiated removal of an edge
    pub(crate) async fn delete(&self, source: &Key, target: &Key) -> GraphResult<()> {
        self.gate(Mutation::Delete)?;
        self.guard_required()?;
        self.authorize_master(Operation::Delete, Some(source), target, None)?;
        self.detach(source, target).await
    }

    /// Detach an edge that is about to be replaced in a ONE slot
    ///
    /// The required check is skipped since the slot is refilled right away.
    pub(crate) async fn replace(&self, source: &Key, previous: &Key) -> GraphResult<()> {
        self.gate(Mutation::Delete)?;
        self.authorize_master(Operation::Delete, Some(source), previous, None)?;
        self.detach(source, previous).await
    }

    /// Cascade: detach every edge of a deleted source
    ///
    /// Targets whose mirror is a required ONE link would be left dangling,
    /// so they are deleted first.
    pub(crate) async fn clear(&self, source: &Key, visited: &mut Visited) -> GraphResult<()> {
        let targets = self.keys(source, &Document::new()).await?;
        let cascade = self
            .backward
            .as_ref()
            .is_some_and(|backward| backward.declaration.is_required_one());

        for target in targets {
            if cascade {
                tracing::warn!(
                    link = %self.forward.id,
                    resource = %self.target.name(),
                    key = %target,
                    "cascade delete of dependent resource"
                );
                self.target_collection()
                    .detached_instance(target.clone())
                    .purge(visited)
                    .await?;
            }
            self.detach(source, &target).await?;
        }
        Ok(())
    }
}
