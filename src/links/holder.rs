use crate::core::error::{GraphError, GraphResult};
use crate::core::field::Key;
use crate::core::link::Cardinality;
use crate::entities::Visited;
use crate::links::collection::RootLinkCollection;
use crate::links::registry::ResourceNode;
use crate::links::service::{LinkService, PendingLink};
use crate::links::to_one::LinkToOne;
use crate::server::entry_point::EntryPoint;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Accessor returned by a lookup by link name
#[derive(Clone)]
pub enum LinkHandle {
    One(LinkToOne),
    Many(RootLinkCollection),
}

/// The links of one resource instance, looked up by name
#[derive(Clone)]
pub struct LinkHolder {
    entry: EntryPoint,
    resource: Arc<ResourceNode>,
    source: Key,
}

impl LinkHolder {
    pub(crate) fn new(entry: EntryPoint, resource: Arc<ResourceNode>, source: Key) -> Self {
        Self {
            entry,
            resource,
            source,
        }
    }

    /// Declared link names, in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.resource.links.keys().map(String::as_str).collect()
    }

    fn service(&self, name: &str) -> GraphResult<Arc<LinkService>> {
        let node = self.resource.link(name).ok_or_else(|| {
            GraphError::not_found(format!(
                "Link '{name}' is not defined on {}",
                self.resource.name()
            ))
        })?;
        Ok(Arc::new(LinkService::new(self.entry.clone(), node.clone())?))
    }

    pub fn get(&self, name: &str) -> GraphResult<LinkHandle> {
        let service = self.service(name)?;
        Ok(match service.declaration().cardinality() {
            Cardinality::One => LinkHandle::One(LinkToOne::new(service, self.source.clone())),
            Cardinality::Many => {
                LinkHandle::Many(RootLinkCollection::new(service, self.source.clone()))
            }
        })
    }

    pub fn one(&self, name: &str) -> GraphResult<LinkToOne> {
        match self.get(name)? {
            LinkHandle::One(link) => Ok(link),
            LinkHandle::Many(_) => Err(GraphError::not_found(format!(
                "Link '{name}' is not a link to one"
            ))),
        }
    }

    pub fn many(&self, name: &str) -> GraphResult<RootLinkCollection> {
        match self.get(name)? {
            LinkHandle::Many(links) => Ok(links),
            LinkHandle::One(_) => Err(GraphError::not_found(format!(
                "Link '{name}' is not a link to many"
            ))),
        }
    }

    /// Validate the link payloads given alongside a new instance
    ///
    /// `raw` maps link names to a payload (ONE) or a list of payloads
    /// (MANY). Every required ONE link must be present.
    pub(crate) async fn validate(
        entry: &EntryPoint,
        resource: &Arc<ResourceNode>,
        raw: &Value,
    ) -> GraphResult<Vec<(Arc<LinkService>, PendingLink)>> {
        let empty = Map::new();
        let payloads = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(GraphError::validation("Links have to be a dict")),
        };

        let missing: Vec<&str> = resource
            .links()
            .map(|node| node.declaration())
            .filter(|link| link.is_required_one())
            .filter(|link| payloads.get(link.name()).is_none_or(Value::is_null))
            .map(|link| link.name())
            .collect();
        if !missing.is_empty() {
            return Err(GraphError::validation(format!(
                "Required links are missing: {}",
                missing.join(", ")
            )));
        }

        let mut pending = Vec::new();
        for (name, payload) in payloads {
            if payload.is_null() {
                continue;
            }
            let scope = format!("@Link {name}");
            let node = resource
                .link(name)
                .ok_or_else(|| GraphError::validation("Link is not defined").prefixed(&scope))?;
            let service = Arc::new(LinkService::new(entry.clone(), node.clone())?);

            match node.declaration().cardinality() {
                Cardinality::One => {
                    let link = service
                        .validate(None, payload, true)
                        .await
                        .map_err(|e| e.prefixed(&scope))?;
                    pending.push((service, link));
                }
                Cardinality::Many => {
                    let Value::Array(items) = payload else {
                        return Err(GraphError::validation("Has to be a list").prefixed(&scope));
                    };
                    let mut seen = HashSet::new();
                    for (index, item) in items.iter().enumerate() {
                        let element = format!("@Element {index}");
                        let link = service
                            .validate(None, item, true)
                            .await
                            .map_err(|e| e.prefixed(&element).prefixed(&scope))?;
                        if !seen.insert(link.target.clone()) {
                            return Err(GraphError::conflict("Link already exists")
                                .prefixed(&element)
                                .prefixed(&scope));
                        }
                        pending.push((service.clone(), link));
                    }
                }
            }
        }
        Ok(pending)
    }

    /// Detach every link of the instance, cascading where required
    pub(crate) async fn clear(&self, visited: &mut Visited) -> GraphResult<()> {
        for node in self.resource.links() {
            let service = LinkService::new(self.entry.clone(), node.clone())?;
            service.clear(&self.source, visited).await?;
        }
        Ok(())
    }
}
