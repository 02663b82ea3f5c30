//! HTTP handlers for link operations
//!
//! Links of cardinality MANY:
//! - `GET /{resource}/{pk}/{link}` lists target keys (`:count` counts them)
//! - `POST /{resource}/{pk}/{link}` attaches a target
//! - `GET|PATCH|DELETE /{resource}/{pk}/{link}/{target}` work on one edge
//!
//! Links of cardinality ONE live under `/{resource}/{pk}/{link}/item`:
//! `GET` returns the target key (`item:data` the payload), `PUT` sets the
//! slot, `PATCH` updates the payload and `DELETE` empties it.

use crate::core::error::GraphError;
use crate::core::extractors::{Caller, PathSegment, Suffix, query_params};
use crate::links::{LinkHandle, LinkHolder};
use crate::server::entry_point::EntryPoint;
use axum::{
    Json,
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;

/// Path segment addressing the single entry of a ONE link
pub const ITEM_SEGMENT: &str = "item";

async fn holder(entry: &EntryPoint, resource: &str, pk: String) -> Result<LinkHolder, GraphError> {
    let instance = entry.resource(resource)?.get(&Value::String(pk)).await?;
    Ok(instance.links())
}

fn no_route(path: &str) -> GraphError {
    GraphError::not_found(format!("No route for {path}"))
}

/// GET /{resource}/{pk}/{link}
pub async fn list_links(
    Caller(entry): Caller,
    Path((resource, pk, link)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GraphError> {
    let segment = PathSegment::parse(&link);
    let links = holder(&entry, &resource, pk).await?.many(&segment.name)?;
    let collection = links.filter(&query_params(params)).await?;

    match segment.suffix {
        Some(Suffix::Count) => Ok(Json(collection.count().await?).into_response()),
        Some(Suffix::Data) => Err(no_route(&link)),
        None => Ok(Json(collection.serialize().await?).into_response()),
    }
}

/// POST /{resource}/{pk}/{link}
pub async fn create_link(
    Caller(entry): Caller,
    Path((resource, pk, link)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, GraphError> {
    let links = holder(&entry, &resource, pk).await?.many(&link)?;
    let instance = links.create(&body).await?;
    Ok((StatusCode::CREATED, Json(instance.serialized_target())).into_response())
}

/// GET /{resource}/{pk}/{link}/{item}
pub async fn get_link(
    Caller(entry): Caller,
    Path((resource, pk, link, item)): Path<(String, String, String, String)>,
) -> Result<Response, GraphError> {
    let segment = PathSegment::parse(&item);
    let instance = match holder(&entry, &resource, pk).await?.get(&link)? {
        LinkHandle::One(one) if segment.name == ITEM_SEGMENT => {
            let instance = one.get().await?;
            if segment.suffix.is_none() {
                return Ok(Json(instance.serialized_target()).into_response());
            }
            instance
        }
        LinkHandle::Many(many) => many.get(&Value::String(segment.name.clone())).await?,
        LinkHandle::One(_) => return Err(no_route(&item)),
    };

    match segment.suffix {
        Some(Suffix::Count) => Err(no_route(&item)),
        _ => Ok(Json(instance.serialize().await?).into_response()),
    }
}

/// PUT /{resource}/{pk}/{link}/item
pub async fn set_link(
    Caller(entry): Caller,
    Path((resource, pk, link, item)): Path<(String, String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, GraphError> {
    if item != ITEM_SEGMENT {
        return Err(no_route(&item));
    }
    let one = holder(&entry, &resource, pk).await?.one(&link)?;
    let instance = one.set(&body).await?;
    Ok((StatusCode::CREATED, Json(instance.serialized_target())).into_response())
}

/// PATCH /{resource}/{pk}/{link}/{item}
pub async fn update_link(
    Caller(entry): Caller,
    Path((resource, pk, link, item)): Path<(String, String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, GraphError> {
    match holder(&entry, &resource, pk).await?.get(&link)? {
        LinkHandle::One(one) if item == ITEM_SEGMENT => one.update(&body).await?,
        LinkHandle::Many(many) => many.get(&Value::String(item)).await?.update(&body).await?,
        LinkHandle::One(_) => return Err(no_route(&item)),
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /{resource}/{pk}/{link}/{item}
pub async fn delete_link(
    Caller(entry): Caller,
    Path((resource, pk, link, item)): Path<(String, String, String, String)>,
) -> Result<Response, GraphError> {
    match holder(&entry, &resource, pk).await?.get(&link)? {
        LinkHandle::One(one) if item == ITEM_SEGMENT => one.delete().await?,
        LinkHandle::Many(many) => many.get(&Value::String(item)).await?.delete().await?,
        LinkHandle::One(_) => return Err(no_route(&item)),
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
