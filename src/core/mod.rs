//! Core module containing the metamodel and the traits the engine is built on
//!
//! Declarations ([`ResourceDeclaration`], [`LinkDeclaration`], [`Schema`])
//! are plain values assembled before setup. Everything that varies per
//! deployment sits behind a trait: [`StorageBackend`], [`IdentityResolver`]
//! and [`KeyPolicy`].

pub mod auth;
pub mod error;
pub mod extractors;
pub mod field;
pub mod key;
pub mod link;
pub mod resource;
pub mod schema;
pub mod service;
pub mod validation;

pub use auth::{
    AccessRequest, AccessRules, AnonymousResolver, AuthContext, AuthPolicy, Credentials,
    HeaderResolver, IdentityResolver, Operation,
};
pub use error::{
    DeclarationError, DeclarationRule, GraphError, GraphResult, StorageError, ValidationError,
};
pub use field::{Document, FieldFormat, FieldValue, Key};
pub use key::{FieldKeyPolicy, GeneratedKeyPolicy, KeyPolicy};
pub use link::{Cardinality, LinkDeclaration};
pub use resource::ResourceDeclaration;
pub use schema::{Field, FieldKind, FieldType, Schema};
pub use service::{Namespace, StorageBackend};
