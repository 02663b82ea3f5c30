//! Resource registry
//!
//! Declarations are registered first, then [`Registry::setup`] reconciles
//! them into an immutable [`Topology`]. Entry points are only handed out
//! once setup has succeeded.

use crate::core::auth::{AnonymousResolver, AuthContext, Credentials, IdentityResolver};
use crate::core::error::{DeclarationError, DeclarationRule, GraphResult};
use crate::core::resource::ResourceDeclaration;
use crate::core::service::StorageBackend;
use crate::links::registry::{LinkNode, ResourceNode, Topology};
use crate::server::entry_point::EntryPoint;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// How resources are named in descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Naming {
    /// Declared resource names
    Raw,
    /// Names given at registration
    #[default]
    Alias,
}

pub struct Registry {
    declarations: IndexMap<String, ResourceDeclaration>,
    /// alias -> declared name
    aliases: HashMap<String, String>,
    /// declared name -> alias
    raw_to_alias: HashMap<String, String>,
    storage: Arc<dyn StorageBackend>,
    resolver: Arc<dyn IdentityResolver>,
    topology: Option<Arc<Topology>>,
    shared_aliases: Arc<HashMap<String, String>>,
}

impl Registry {
    pub fn new(storage: impl StorageBackend + 'static) -> Self {
        Self::with_shared_storage(Arc::new(storage))
    }

    pub fn with_shared_storage(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            declarations: IndexMap::new(),
            aliases: HashMap::new(),
            raw_to_alias: HashMap::new(),
            storage,
            resolver: Arc::new(AnonymousResolver),
            topology: None,
            shared_aliases: Arc::new(HashMap::new()),
        }
    }

    pub fn with_identity_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub(crate) fn set_identity_resolver(&mut self, resolver: Arc<dyn IdentityResolver>) {
        self.resolver = resolver;
    }

    /// Register a resource under its declared name
    pub fn register(&mut self, declaration: ResourceDeclaration) -> Result<(), DeclarationError> {
        let alias = declaration.name().to_string();
        self.register_as(alias, declaration)
    }

    /// Register a resource under an alias used by callers and descriptions
    pub fn register_as(
        &mut self,
        alias: impl Into<String>,
        declaration: ResourceDeclaration,
    ) -> Result<(), DeclarationError> {
        if self.topology.is_some() {
            return Err(DeclarationError::Frozen);
        }
        let alias = alias.into();
        let name = declaration.name().to_string();

        declaration.validate()?;
        if self.declarations.contains_key(&name) {
            return Err(DeclarationError::invalid(
                &name,
                DeclarationRule::DuplicateName,
                "resource is already registered",
            ));
        }
        if self.aliases.contains_key(&alias) {
            return Err(DeclarationError::invalid(
                &name,
                DeclarationRule::DuplicateName,
                format!("alias '{alias}' is already taken"),
            ));
        }

        tracing::info!(resource = %name, alias = %alias, "registered resource");
        self.aliases.insert(alias.clone(), name.clone());
        self.raw_to_alias.insert(name.clone(), alias);
        self.declarations.insert(name, declaration);
        Ok(())
    }

    /// Reconcile links; calling it again after success is a no-op
    pub fn setup(&mut self) -> Result<(), DeclarationError> {
        if self.topology.is_some() {
            return Ok(());
        }
        let topology = Topology::reconcile(&self.declarations)?;
        self.topology = Some(Arc::new(topology));
        self.shared_aliases = Arc::new(self.aliases.clone());

        tracing::info!(resources = self.declarations.len(), "registry is set up");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.topology.is_some()
    }

    pub fn topology(&self) -> Option<&Arc<Topology>> {
        self.topology.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    fn ready_topology(&self) -> Result<&Arc<Topology>, DeclarationError> {
        self.topology.as_ref().ok_or(DeclarationError::NotReady)
    }

    /// Entry point for the caller identified by `credentials`
    pub async fn entry_point(&self, credentials: &Credentials) -> GraphResult<EntryPoint> {
        self.ready_topology()?;
        let caller = self.resolver.resolve(credentials).await?;
        self.entry_point_for(caller)
    }

    /// Entry point for an already-resolved caller
    pub fn entry_point_for(&self, caller: AuthContext) -> GraphResult<EntryPoint> {
        let topology = self.ready_topology()?.clone();
        Ok(EntryPoint::new(
            topology,
            self.storage.clone(),
            self.shared_aliases.clone(),
            caller,
        ))
    }

    /// Registered resource names, in registration order
    pub fn resource_names(&self, naming: Naming) -> Vec<String> {
        self.declarations
            .keys()
            .map(|name| self.display_name(name, naming))
            .collect()
    }

    fn display_name(&self, name: &str, naming: Naming) -> String {
        match naming {
            Naming::Raw => name.to_string(),
            Naming::Alias => self
                .raw_to_alias
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string()),
        }
    }

    /// Structural description of every resource, its fields and links
    pub fn describe(&self, naming: Naming) -> GraphResult<Value> {
        let topology = self.ready_topology()?;
        let resources: Map<String, Value> = topology
            .resources()
            .map(|node| {
                (
                    self.display_name(node.name(), naming),
                    self.describe_resource(node, naming),
                )
            })
            .collect();
        Ok(Value::Object(resources))
    }

    fn describe_resource(&self, node: &ResourceNode, naming: Naming) -> Value {
        let declaration = node.declaration();
        let links: Map<String, Value> = node
            .links()
            .map(|link| (link.declaration().name().to_string(), self.describe_link(link, naming)))
            .collect();

        json!({
            "name": self.display_name(node.name(), naming),
            "description": declaration.description,
            "key": declaration.policy().describe(),
            "schema": declaration.resource_schema().describe(),
            "query_schema": declaration.resource_query_schema().describe(),
            "links": links,
            "meta": declaration.meta,
        })
    }

    fn describe_link(&self, link: &LinkNode, naming: Naming) -> Value {
        let declaration = link.declaration();
        json!({
            "target": self.display_name(declaration.target(), naming),
            "cardinality": declaration.cardinality(),
            "master": declaration.is_master(),
            "required": declaration.is_required(),
            "one_way": declaration.is_one_way(),
            "readonly": declaration.is_readonly(),
            "changeable": declaration.is_changeable(),
            "related_name": declaration.related(),
            "description": declaration.description,
            "schema": declaration.link_schema().describe(),
            "query_schema": declaration.link_query_schema().describe(),
            "meta": declaration.meta,
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.declarations.keys().collect::<Vec<_>>())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphError;
    use crate::core::link::LinkDeclaration;
    use crate::core::schema::{Field, Schema};
    use crate::storage::InMemoryStorage;

    fn resource(name: &str) -> ResourceDeclaration {
        ResourceDeclaration::new(name).schema(Schema::new().field("pk", Field::integer().pk()))
    }

    #[test]
    fn test_entry_point_before_setup_fails() {
        let mut registry = Registry::new(InMemoryStorage::new());
        registry.register(resource("Source")).unwrap();
        let err = registry.entry_point_for(AuthContext::Anonymous).unwrap_err();
        assert!(matches!(err, GraphError::Declaration(DeclarationError::NotReady)));
        assert!(registry.describe(Naming::Raw).is_err());
    }

    #[test]
    fn test_setup_is_idempotent_and_freezes() {
        let mut registry = Registry::new(InMemoryStorage::new());
        registry.register(resource("Source")).unwrap();
        registry.setup().unwrap();
        registry.setup().unwrap();
        assert!(registry.is_ready());
        assert!(matches!(
            registry.register(resource("Late")),
            Err(DeclarationError::Frozen)
        ));
    }

    #[test]
    fn test_duplicate_names_and_aliases() {
        let mut registry = Registry::new(InMemoryStorage::new());
        registry.register_as("sources", resource("Source")).unwrap();
        let err = registry.register(resource("Source")).unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::DuplicateName));
        let err = registry.register_as("sources", resource("Other")).unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::DuplicateName));
    }

    #[test]
    fn test_describe_by_alias_and_raw_name() {
        let mut registry = Registry::new(InMemoryStorage::new());
        registry
            .register_as(
                "sources",
                resource("Source").link(
                    LinkDeclaration::to_many("targets", "Target")
                        .related_name("sources")
                        .master(),
                ),
            )
            .unwrap();
        registry
            .register_as(
                "targets",
                resource("Target")
                    .link(LinkDeclaration::to_many("sources", "Source").related_name("targets")),
            )
            .unwrap();
        registry.setup().unwrap();

        let by_alias = registry.describe(Naming::Alias).unwrap();
        assert_eq!(by_alias["sources"]["links"]["targets"]["target"], "targets");
        assert_eq!(by_alias["sources"]["links"]["targets"]["cardinality"], "MANY");

        let raw = registry.describe(Naming::Raw).unwrap();
        assert_eq!(raw["Source"]["links"]["targets"]["target"], "Target");
        assert_eq!(raw["Source"]["schema"]["pk"]["type"], "int");
        assert_eq!(
            registry.resource_names(Naming::Alias),
            vec!["sources".to_string(), "targets".to_string()]
        );
    }

    #[tokio::test]
    async fn test_entry_point_resolves_aliases() {
        let mut registry = Registry::new(InMemoryStorage::new());
        registry.register_as("sources", resource("Source")).unwrap();
        registry.setup().unwrap();

        let entry = registry.entry_point(&Credentials::new()).await.unwrap();
        assert_eq!(entry.caller(), &AuthContext::Anonymous);
        assert_eq!(entry.resource("sources").unwrap().name(), "Source");
        assert_eq!(entry.resource("Source").unwrap().name(), "Source");
        assert!(matches!(entry.resource("nothing"), Err(GraphError::NotFound(_))));
    }
}
