//! HTTP extractors shared by the REST handlers
//!
//! - [`AppState`]: the registry handed to every handler
//! - [`Caller`]: an entry point bound to the identity found in the request headers
//! - [`PathSegment`]: a path segment with an optional `:count` / `:data` suffix

use crate::core::auth::Credentials;
use crate::core::error::GraphError;
use crate::server::entry_point::EntryPoint;
use crate::server::registry::Registry;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// Header values handed to the identity resolver
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let mut credentials = Credentials::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            credentials.insert(name.as_str(), value);
        }
    }
    credentials
}

/// The entry point of the caller making the request
pub struct Caller(pub EntryPoint);

impl FromRequestParts<AppState> for Caller {
    type Rejection = GraphError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = credentials_from_headers(&parts.headers);
        let entry = state.registry.entry_point(&credentials).await?;
        Ok(Caller(entry))
    }
}

/// Output variant requested by a path suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Count,
    Data,
}

/// A path segment split from its suffix, e.g. `Source:count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub suffix: Option<Suffix>,
}

impl PathSegment {
    pub fn parse(segment: &str) -> Self {
        let split = segment.rsplit_once(':').and_then(|(name, suffix)| {
            let suffix = match suffix {
                "count" => Suffix::Count,
                "data" => Suffix::Data,
                _ => return None,
            };
            Some((name, suffix))
        });

        match split {
            Some((name, suffix)) => Self {
                name: name.to_string(),
                suffix: Some(suffix),
            },
            None => Self {
                name: segment.to_string(),
                suffix: None,
            },
        }
    }
}

/// Query string parameters as a raw filter document
pub fn query_params(params: HashMap<String, String>) -> Value {
    if params.is_empty() {
        return Value::Null;
    }
    Value::Object(
        params
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect::<Map<String, Value>>(),
    )
}
