//! REST API exposure for the resource graph
//!
//! This module provides REST-specific routing and handlers on top of a set-up
//! [`Registry`]. It is a thin translator: every route resolves the caller,
//! then calls the runtime handles.

use crate::core::error::GraphError;
use crate::core::extractors::AppState;
use crate::server::registry::{Naming, Registry};
use crate::server::router::build_graph_routes;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, options},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - `OPTIONS /`, the schema of every resource by alias
    /// - Resource and link routes
    /// - Custom routes
    pub fn build_router(registry: Arc<Registry>, custom_routes: Vec<Router>) -> Result<Router> {
        if !registry.is_ready() {
            anyhow::bail!("registry must be set up before building routes");
        }
        let state = AppState::new(registry);

        let meta_routes = Router::new()
            .route("/", options(Self::describe))
            .with_state(state.clone());

        let mut app = Self::health_routes().merge(meta_routes);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }
        app = app.merge(build_graph_routes(state));

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "resource-graph"
        }))
    }

    /// Schema of every registered resource
    async fn describe(State(state): State<AppState>) -> Result<Json<Value>, GraphError> {
        Ok(Json(state.registry.describe(Naming::Alias)?))
    }
}
