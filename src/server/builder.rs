//! GraphBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::registry::Registry;
use crate::config::GraphConfig;
use crate::core::auth::IdentityResolver;
use crate::core::resource::ResourceDeclaration;
use crate::core::service::StorageBackend;
use crate::storage::InMemoryStorage;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for a set-up registry and its REST router
///
/// # Example
///
/// ```ignore
/// let app = GraphBuilder::new()
///     .register(teacher_declaration())
///     .register_as("courses", course_declaration())
///     .build()?;
/// ```
pub struct GraphBuilder {
    storage: Option<Arc<dyn StorageBackend>>,
    resolver: Option<Arc<dyn IdentityResolver>>,
    declarations: Vec<(Option<String>, ResourceDeclaration)>,
    configs: Vec<GraphConfig>,
    custom_routes: Vec<Router>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            resolver: None,
            declarations: Vec::new(),
            configs: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Set the storage backend; in-memory storage is used otherwise
    pub fn with_storage(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Share a storage backend with other code, e.g. tests seeding data
    pub fn with_shared_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_identity_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Register a resource under its declared name
    pub fn register(mut self, declaration: ResourceDeclaration) -> Self {
        self.declarations.push((None, declaration));
        self
    }

    /// Register a resource under an alias
    pub fn register_as(mut self, alias: impl Into<String>, declaration: ResourceDeclaration) -> Self {
        self.declarations.push((Some(alias.into()), declaration));
        self
    }

    /// Add resources declared in YAML
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Add routes that sit next to the graph routes (login, webhooks...)
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Register every declaration and run setup
    ///
    /// Declarations added in code come first, then configuration resources
    /// in the order the configs were added.
    pub fn build_registry(&mut self) -> Result<Registry> {
        let storage = self
            .storage
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryStorage::new()));
        let mut registry = Registry::with_shared_storage(storage);
        if let Some(resolver) = self.resolver.take() {
            registry.set_identity_resolver(resolver);
        }

        for (alias, declaration) in std::mem::take(&mut self.declarations) {
            match alias {
                Some(alias) => registry.register_as(alias, declaration)?,
                None => registry.register(declaration)?,
            }
        }

        let merged = GraphConfig::merge(std::mem::take(&mut self.configs));
        for (alias, declaration) in merged.into_declarations()? {
            registry.register_as(alias, declaration)?;
        }

        registry.setup()?;
        Ok(registry)
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let registry = Arc::new(self.build_registry()?);
        let custom_routes = std::mem::take(&mut self.custom_routes);
        RestExposure::build_router(registry, custom_routes)
    }

    /// Serve the application with graceful shutdown on SIGTERM or Ctrl+C
    ///
    /// ```ignore
    /// GraphBuilder::new()
    ///     .with_config(GraphConfig::from_yaml_file("graph.yaml")?)
    ///     .serve("127.0.0.1:3000").await?;
    /// ```
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DeclarationRule;
    use crate::core::link::LinkDeclaration;
    use crate::core::schema::{Field, Schema};

    fn keyed(name: &str) -> ResourceDeclaration {
        ResourceDeclaration::new(name).schema(Schema::new().field("pk", Field::integer().pk()))
    }

    #[test]
    fn test_default_is_empty() {
        let builder = GraphBuilder::default();
        assert!(builder.storage.is_none());
        assert!(builder.declarations.is_empty());
        assert!(builder.configs.is_empty());
        assert!(builder.custom_routes.is_empty());
    }

    #[test]
    fn test_build_registry_sets_up() {
        let mut builder = GraphBuilder::new()
            .register(keyed("Source").link(LinkDeclaration::to_one("target", "Target").one_way()))
            .register_as("targets", keyed("Target"));
        let registry = builder.build_registry().unwrap();
        assert!(registry.is_ready());
        assert_eq!(
            registry.resource_names(super::super::registry::Naming::Alias),
            vec!["Source".to_string(), "targets".to_string()]
        );
    }

    #[test]
    fn test_config_resources_are_registered() {
        let config = GraphConfig::from_yaml_str(
            r#"
resources:
  - name: Note
    alias: notes
    fields: [{ name: pk, type: int, pk: true }]
"#,
        )
        .unwrap();
        let mut builder = GraphBuilder::new().with_config(config);
        let registry = builder.build_registry().unwrap();
        assert!(registry.describe(super::super::registry::Naming::Alias).unwrap()["notes"].is_object());
    }

    #[test]
    fn test_reconciliation_failure_surfaces() {
        let mut builder = GraphBuilder::new()
            .register(keyed("Source").link(LinkDeclaration::to_one("target", "Missing").one_way()));
        let err = builder.build_registry().unwrap_err();
        let declaration = err.downcast_ref::<crate::core::error::DeclarationError>().unwrap();
        assert_eq!(declaration.rule(), Some(DeclarationRule::UnknownTarget));
    }

    #[test]
    fn test_build_with_custom_routes() {
        use axum::routing::get;

        let custom = Router::new().route("/custom", get(|| async { "ok" }));
        let router = GraphBuilder::new()
            .register(keyed("Source"))
            .with_custom_routes(custom)
            .build();
        assert!(router.is_ok());
    }
}
