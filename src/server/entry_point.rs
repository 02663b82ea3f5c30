//! Caller-bound access to the graph

use crate::core::auth::{AccessRequest, AuthContext, Operation};
use crate::core::error::{GraphError, GraphResult};
use crate::core::field::Key;
use crate::core::service::StorageBackend;
use crate::entities::RootResourceCollection;
use crate::links::registry::{ResourceNode, Topology};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The graph as seen by one caller
///
/// Cheap to clone; every runtime handle carries one.
#[derive(Clone)]
pub struct EntryPoint {
    pub(crate) topology: Arc<Topology>,
    pub(crate) storage: Arc<dyn StorageBackend>,
    pub(crate) aliases: Arc<HashMap<String, String>>,
    pub(crate) caller: Arc<AuthContext>,
}

impl EntryPoint {
    pub(crate) fn new(
        topology: Arc<Topology>,
        storage: Arc<dyn StorageBackend>,
        aliases: Arc<HashMap<String, String>>,
        caller: AuthContext,
    ) -> Self {
        Self {
            topology,
            storage,
            aliases,
            caller: Arc::new(caller),
        }
    }

    pub fn caller(&self) -> &AuthContext {
        &self.caller
    }

    /// Root accessor of a resource, by alias or declared name
    pub fn resource(&self, name: &str) -> GraphResult<RootResourceCollection> {
        Ok(RootResourceCollection::new(self.clone(), self.node(name)?))
    }

    pub(crate) fn node(&self, name: &str) -> GraphResult<Arc<ResourceNode>> {
        let raw = self.aliases.get(name).map_or(name, String::as_str);
        self.topology
            .resource(raw)
            .cloned()
            .ok_or_else(|| GraphError::not_found(format!("Resource '{name}' is not registered")))
    }

    pub(crate) fn can_discover(&self, node: &ResourceNode, key: &Key) -> bool {
        let request =
            AccessRequest::new(&self.caller, Operation::Discover, node.name()).key(Some(key));
        node.declaration.access_rules().check(&request)
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}
