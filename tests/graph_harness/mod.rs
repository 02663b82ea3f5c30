//! Shared fixtures for graph integration tests
//!
//! Two resources, `Source` and `Target`, both keyed by an integer `pk`. Each
//! test wires them with whatever links it needs.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod graph_harness;
//! use graph_harness::*;
//! ```

#![allow(dead_code)]

use resource_graph::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

/// A resource keyed by an integer `pk` with a required `name`
pub fn keyed(name: &str) -> ResourceDeclaration {
    resource!(name, {
        "pk" => Field::integer().pk(),
        "name" => Field::string(),
    })
}

/// Source <-> Target through `targets` / `sources`
///
/// `forward` is declared on Source, `backward` on Target.
pub fn pair(forward: LinkDeclaration, backward: LinkDeclaration) -> Vec<ResourceDeclaration> {
    vec![keyed("Source").link(forward), keyed("Target").link(backward)]
}

/// Many-to-many with the payload on Source
pub fn many_to_many() -> Vec<ResourceDeclaration> {
    pair(
        LinkDeclaration::to_many("targets", "Target")
            .related_name("sources")
            .master()
            .schema(Schema::new().field("weight", Field::integer().optional())),
        LinkDeclaration::to_many("sources", "Source").related_name("targets"),
    )
}

/// Every Source must point at exactly one Target
pub fn required_one() -> Vec<ResourceDeclaration> {
    pair(
        LinkDeclaration::to_one("target", "Target")
            .related_name("sources")
            .required(),
        LinkDeclaration::to_many("sources", "Source")
            .related_name("target")
            .master(),
    )
}

/// A registry holding `declarations`, set up over shared in-memory storage
pub fn setup(declarations: Vec<ResourceDeclaration>) -> (Arc<Registry>, InMemoryStorage) {
    let storage = InMemoryStorage::new();
    let mut registry = Registry::new(storage.clone());
    for declaration in declarations {
        registry
            .register(declaration)
            .expect("declaration should register");
    }
    registry.setup().expect("setup should succeed");
    (Arc::new(registry), storage)
}

pub fn anonymous(registry: &Registry) -> EntryPoint {
    registry
        .entry_point_for(AuthContext::Anonymous)
        .expect("registry is set up")
}

pub fn admin(registry: &Registry) -> EntryPoint {
    registry
        .entry_point_for(AuthContext::Admin {
            admin_id: Uuid::new_v4(),
        })
        .expect("registry is set up")
}

pub fn user(registry: &Registry, roles: &[&str]) -> EntryPoint {
    registry
        .entry_point_for(AuthContext::User {
            user_id: Uuid::new_v4(),
            roles: roles.iter().map(|role| role.to_string()).collect(),
        })
        .expect("registry is set up")
}

/// Create `{pk, name}` without links
pub async fn create(entry: &EntryPoint, resource: &str, pk: i64) -> ResourceInstance {
    entry
        .resource(resource)
        .expect("resource is registered")
        .create(&json!({"pk": pk, "name": format!("{resource} {pk}")}), &Value::Null)
        .await
        .expect("create should succeed")
}

/// Create `{pk, name}` with link payloads
pub async fn create_with_links(
    entry: &EntryPoint,
    resource: &str,
    pk: i64,
    links: Value,
) -> GraphResult<ResourceInstance> {
    entry
        .resource(resource)?
        .create(&json!({"pk": pk, "name": format!("{resource} {pk}")}), &links)
        .await
}

pub fn link_to(target: i64) -> Value {
    json!({ "@target": target })
}
