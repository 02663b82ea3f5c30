//! Router builder utilities for graph routes

use crate::core::extractors::AppState;
use crate::entities::handlers::{
    create_resource, delete_resource, get_resource, list_resources, update_resource,
};
use crate::links::handlers::{
    create_link, delete_link, get_link, list_links, set_link, update_link,
};
use axum::{Router, routing::get};

/// Build resource and link routes
///
/// These routes are generic and work for every registered resource:
/// - GET|POST /{resource}
/// - GET|PATCH|DELETE /{resource}/{pk}
/// - GET|POST /{resource}/{pk}/{link}
/// - GET|PUT|PATCH|DELETE /{resource}/{pk}/{link}/{item}
pub fn build_graph_routes(state: AppState) -> Router {
    Router::new()
        .route("/{resource}", get(list_resources).post(create_resource))
        .route(
            "/{resource}/{pk}",
            get(get_resource)
                .patch(update_resource)
                .delete(delete_resource),
        )
        .route("/{resource}/{pk}/{link}", get(list_links).post(create_link))
        .route(
            "/{resource}/{pk}/{link}/{item}",
            get(get_link)
                .put(set_link)
                .patch(update_link)
                .delete(delete_link),
        )
        .with_state(state)
}
