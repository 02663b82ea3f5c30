//! HTTP handlers for resource operations
//!
//! - `GET /{resource}` lists keys, `GET /{resource}:count` counts them
//! - `POST /{resource}` creates; `@links` in the body carries link payloads
//! - `GET|PATCH|DELETE /{resource}/{pk}` read, update and delete one instance

use crate::core::error::GraphError;
use crate::core::extractors::{Caller, PathSegment, Suffix, query_params};
use axum::{
    Json,
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;

/// Body key holding the link payloads of a new instance
pub const LINKS_KEY: &str = "@links";

/// GET /{resource} and GET /{resource}:count
pub async fn list_resources(
    Caller(entry): Caller,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GraphError> {
    let segment = PathSegment::parse(&resource);
    let collection = entry.resource(&segment.name)?.filter(&query_params(params)).await?;

    match segment.suffix {
        Some(Suffix::Count) => Ok(Json(collection.count().await?).into_response()),
        Some(Suffix::Data) => Err(GraphError::not_found(format!("No route for {resource}"))),
        None => Ok(Json(collection.serialize().await?).into_response()),
    }
}

/// POST /{resource}
pub async fn create_resource(
    Caller(entry): Caller,
    Path(resource): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<Response, GraphError> {
    let links = match &mut body {
        Value::Object(map) => map.remove(LINKS_KEY).unwrap_or(Value::Null),
        _ => Value::Null,
    };

    let instance = entry.resource(&resource)?.create(&body, &links).await?;
    Ok((StatusCode::CREATED, Json(instance.serialized_key())).into_response())
}

/// GET /{resource}/{pk}
pub async fn get_resource(
    Caller(entry): Caller,
    Path((resource, pk)): Path<(String, String)>,
) -> Result<Response, GraphError> {
    let instance = entry.resource(&resource)?.get(&Value::String(pk)).await?;
    Ok(Json(instance.serialize().await?).into_response())
}

/// PATCH /{resource}/{pk}
pub async fn update_resource(
    Caller(entry): Caller,
    Path((resource, pk)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, GraphError> {
    let instance = entry.resource(&resource)?.get(&Value::String(pk)).await?;
    instance.update(&body).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /{resource}/{pk}
pub async fn delete_resource(
    Caller(entry): Caller,
    Path((resource, pk)): Path<(String, String)>,
) -> Result<Response, GraphError> {
    let instance = entry.resource(&resource)?.get(&Value::String(pk)).await?;
    instance.delete().await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
