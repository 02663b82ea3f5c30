//! Typed error handling for the resource graph
//!
//! Every failure of a graph operation surfaces through [`GraphError`]. The
//! variants follow one taxonomy shared by resources and links:
//!
//! - [`ValidationError`]: malformed or out-of-constraint caller input
//! - `NotFound`: missing entity, hidden entity, or undecodable key
//! - `Conflict`: creating a key or a relation that already exists
//! - `Forbidden`: a structural rule (readonly, unchangeable, required) disallows the call
//! - `Authorization`: a caller-supplied predicate denied the call
//! - `MultipleFound`: the backend holds more than one entry for a ONE link
//! - [`DeclarationError`]: inconsistent metamodel, raised at registration or setup
//! - [`StorageError`]: the backend itself failed
//!
//! # Example
//!
//! ```rust,ignore
//! match sources.get(1).await {
//!     Ok(source) => println!("found {}", source.key()),
//!     Err(GraphError::NotFound(message)) => println!("missing: {message}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key under which document-level validation problems are reported
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Result alias used across the crate
pub type GraphResult<T> = Result<T, GraphError>;

/// The main error type of the resource graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Caller input failed validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The entity does not exist or is not discoverable by the caller
    #[error("{0}")]
    NotFound(String),

    /// The key or relation already exists
    #[error("{0}")]
    Conflict(String),

    /// The operation is structurally disallowed by the metamodel
    #[error("{0}")]
    Forbidden(String),

    /// An authorization predicate denied the operation
    #[error("{0}")]
    Authorization(String),

    /// A ONE link resolved to several entries
    #[error("{0}")]
    MultipleFound(String),

    /// The metamodel is inconsistent or not ready
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// The storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GraphError {
    pub fn not_found(message: impl Into<String>) -> Self {
        GraphError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        GraphError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        GraphError::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        GraphError::Authorization(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation(ValidationError::Message(message.into()))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GraphError::Validation(_) => StatusCode::BAD_REQUEST,
            GraphError::NotFound(_) => StatusCode::NOT_FOUND,
            GraphError::Conflict(_) => StatusCode::CONFLICT,
            GraphError::Forbidden(_) => StatusCode::METHOD_NOT_ALLOWED,
            GraphError::Authorization(_) => StatusCode::FORBIDDEN,
            GraphError::MultipleFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GraphError::Declaration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GraphError::Storage(e) => e.status_code(),
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::Validation(_) => "VALIDATION_ERROR",
            GraphError::NotFound(_) => "NOT_FOUND",
            GraphError::Conflict(_) => "CONFLICT",
            GraphError::Forbidden(_) => "FORBIDDEN",
            GraphError::Authorization(_) => "AUTHORIZATION_ERROR",
            GraphError::MultipleFound(_) => "MULTIPLE_FOUND",
            GraphError::Declaration(e) => e.error_code(),
            GraphError::Storage(e) => e.error_code(),
        }
    }

    /// Prefix the message with a scope, keeping the error kind
    ///
    /// Validation errors are nested rather than flattened so the field
    /// structure survives.
    pub fn prefixed(self, scope: &str) -> Self {
        match self {
            GraphError::Validation(e) => GraphError::Validation(e.prefixed(scope)),
            GraphError::NotFound(m) => GraphError::NotFound(format!("{scope}: {m}")),
            GraphError::Conflict(m) => GraphError::Conflict(format!("{scope}: {m}")),
            GraphError::Forbidden(m) => GraphError::Forbidden(format!("{scope}: {m}")),
            GraphError::Authorization(m) => GraphError::Authorization(format!("{scope}: {m}")),
            GraphError::MultipleFound(m) => GraphError::MultipleFound(format!("{scope}: {m}")),
            other => other,
        }
    }

    /// Convert to the response body sent to HTTP clients
    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            GraphError::Validation(e) => serde_json::to_value(e).ok(),
            GraphError::Declaration(DeclarationError::Invalid { subject, rule, .. }) => {
                Some(serde_json::json!({ "subject": subject, "rule": rule }))
            }
            _ => None,
        };

        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for GraphError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Structured validation failure
///
/// Mirrors the shape of the rejected document: a plain message for scalars,
/// per-index errors for lists and per-field errors for objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationError {
    /// A single problem
    Message(String),

    /// Problems of individual list elements, keyed by index
    Items(Vec<(usize, ValidationError)>),

    /// Problems of individual document fields
    Fields(BTreeMap<String, Vec<ValidationError>>),
}

impl ValidationError {
    pub fn message(message: impl Into<String>) -> Self {
        ValidationError::Message(message.into())
    }

    /// A single-field error
    pub fn field(name: impl Into<String>, error: ValidationError) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.into(), vec![error]);
        ValidationError::Fields(fields)
    }

    /// Messages attached to a field, if any
    pub fn field_errors(&self, name: &str) -> Option<&[ValidationError]> {
        match self {
            ValidationError::Fields(fields) => fields.get(name).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Scope the error under a label such as `@Link owner`
    pub fn prefixed(self, scope: &str) -> Self {
        match self {
            ValidationError::Message(m) => ValidationError::Message(format!("{scope}: {m}")),
            other => ValidationError::field(scope, other),
        }
    }

    /// True when any message in the tree contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Message(m) => write!(f, "{m}"),
            ValidationError::Items(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|(index, error)| format!("[{index}]: {error}"))
                    .collect();
                write!(f, "{}", parts.join("; "))
            }
            ValidationError::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, errors)| {
                        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                        format!("{name}: {}", messages.join(", "))
                    })
                    .collect();
                write!(f, "{}", parts.join("; "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// =============================================================================
// Declaration Errors
// =============================================================================

/// The metamodel rule a declaration broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationRule {
    FieldConstraint,
    KeyPolicy,
    DuplicateName,
    UnknownTarget,
    MissingRelatedName,
    MissingTarget,
    MissingMirror,
    MirrorMismatch,
    RequiredToMany,
    InvalidCardinality,
    InvalidFlag,
    InvalidPolicy,
    NoMaster,
    BothMaster,
}

/// Registration or setup-time metamodel inconsistency
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    /// A declaration violates a metamodel rule
    #[error("{subject}: {message}")]
    Invalid {
        subject: String,
        rule: DeclarationRule,
        message: String,
    },

    /// A runtime operation was attempted before setup
    #[error("service's setup method was not called")]
    NotReady,

    /// A declaration was registered after setup
    #[error("declarations are frozen once setup has run")]
    Frozen,
}

impl DeclarationError {
    pub fn invalid(
        subject: impl Into<String>,
        rule: DeclarationRule,
        message: impl Into<String>,
    ) -> Self {
        DeclarationError::Invalid {
            subject: subject.into(),
            rule,
            message: message.into(),
        }
    }

    /// The rule this error names, when there is one
    pub fn rule(&self) -> Option<DeclarationRule> {
        match self {
            DeclarationError::Invalid { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DeclarationError::Invalid { .. } => "DECLARATION_ERROR",
            DeclarationError::NotReady => "NOT_READY",
            DeclarationError::Frozen => "DECLARATIONS_FROZEN",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Failures reported by a storage backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Generic backend failure
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A lock guarding in-process state was poisoned
    #[error("failed to acquire {0} lock")]
    LockPoisoned(&'static str),

    /// The backend does not implement the operation
    #[error("storage backend does not support {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    fn status_code(&self) -> StatusCode {
        match self {
            StorageError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            StorageError::Backend(_) => "STORAGE_ERROR",
            StorageError::LockPoisoned(_) => "STORAGE_LOCK_ERROR",
            StorageError::Unsupported(_) => "STORAGE_UNSUPPORTED",
        }
    }
}
