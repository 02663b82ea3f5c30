//! # Resource Graph
//!
//! A declarative engine for typed resources connected by typed, bidirectional
//! links, exposed over REST.
//!
//! ## Features
//!
//! - **Schemas**: typed fields with constraints, defaults, readonly and
//!   unchangeable flags, validated on every write
//! - **Bidirectional Links**: each relation is declared on both resources and
//!   reconciled at setup; one side is the master and owns the payload
//! - **Cardinality**: one-to-one, one-to-many and many-to-many relations
//! - **Cascade Delete**: deleting a target removes resources whose required
//!   ONE link pointed at it
//! - **Authorization**: a policy per operation, resolved against the caller
//! - **Configuration-Based**: declare resources and links in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resource_graph::prelude::*;
//!
//! let app = GraphBuilder::new()
//!     .register_as("teachers", resource!("Teacher", {
//!         "pk" => Field::integer().pk(),
//!         "name" => Field::string(),
//!     } links [
//!         LinkDeclaration::to_many("courses", "Course").related_name("teacher").master(),
//!     ]))
//!     .register_as("courses", resource!("Course", {
//!         "pk" => Field::integer().pk(),
//!         "title" => Field::string(),
//!     } links [
//!         LinkDeclaration::to_one("teacher", "Teacher").related_name("courses"),
//!     ]))
//!     .build()?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod links;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Metamodel ===
    pub use crate::core::{
        auth::{
            AccessRequest, AccessRules, AuthContext, AuthPolicy, Credentials, HeaderResolver,
            IdentityResolver, Operation,
        },
        error::{DeclarationError, GraphError, GraphResult, ValidationError},
        field::{Document, FieldFormat, FieldValue, Key},
        key::{FieldKeyPolicy, GeneratedKeyPolicy, KeyPolicy},
        link::{Cardinality, LinkDeclaration},
        resource::ResourceDeclaration,
        schema::{Field, FieldType, Schema},
        service::{Namespace, StorageBackend},
    };

    // === Macros ===
    pub use crate::{resource, schema};

    // === Runtime handles ===
    pub use crate::entities::{ResourceCollection, ResourceInstance, RootResourceCollection};
    pub use crate::links::{
        LinkCollection, LinkHandle, LinkHolder, LinkInstance, LinkToOne, RootLinkCollection,
    };

    // === Storage ===
    pub use crate::storage::InMemoryStorage;

    // === Config ===
    pub use crate::config::GraphConfig;

    // === Server ===
    pub use crate::server::{EntryPoint, GraphBuilder, Naming, Registry};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use uuid::Uuid;

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        routing::{delete, get, post, put},
    };
}
