//! Authorization system
//!
//! Provides caller identities and the predicates gating graph operations:
//! - [`AuthContext`]: who is calling
//! - [`AccessRequest`]: what the caller is trying to do
//! - [`AuthPolicy`]: a predicate over requests
//! - [`AccessRules`]: one policy per operation kind
//! - [`IdentityResolver`]: turns credentials into an `AuthContext`

use crate::core::error::{GraphError, GraphResult};
use crate::core::field::{Document, Key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of the caller bound to an entry point
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    /// Authenticated user
    User { user_id: Uuid, roles: Vec<String> },

    /// Owner of a specific resource instance
    Owner {
        user_id: Uuid,
        resource_type: String,
        resource_key: Key,
    },

    /// Service-to-service communication
    Service { service_name: String },

    /// System administrator
    Admin { admin_id: Uuid },

    /// No authentication (public access)
    Anonymous,
}

impl AuthContext {
    /// Check if context represents an admin
    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    /// Check if context represents a service
    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            AuthContext::Owner { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        match self {
            AuthContext::User { roles, .. } => roles.iter().any(|r| r == role),
            _ => false,
        }
    }
}

/// Operation kinds that carry their own predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Discover,
    View,
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Discover => "discover",
            Operation::View => "view",
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Everything a predicate may look at
///
/// For resources `key` is the instance key. For links `key` is the source
/// key and `related_key` the target key, both as seen from the side whose
/// predicate is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub caller: &'a AuthContext,
    pub operation: Operation,
    /// Resource name, or qualified link name (`Source:link`)
    pub subject: &'a str,
    pub key: Option<&'a Key>,
    pub related_key: Option<&'a Key>,
    /// Data being written, or previously stored data for views
    pub data: Option<&'a Document>,
}

impl<'a> AccessRequest<'a> {
    pub fn new(caller: &'a AuthContext, operation: Operation, subject: &'a str) -> Self {
        Self {
            caller,
            operation,
            subject,
            key: None,
            related_key: None,
            data: None,
        }
    }

    pub fn key(mut self, key: Option<&'a Key>) -> Self {
        self.key = key;
        self
    }

    pub fn related_key(mut self, key: Option<&'a Key>) -> Self {
        self.related_key = key;
        self
    }

    pub fn data(mut self, data: Option<&'a Document>) -> Self {
        self.data = data;
        self
    }
}

/// Custom predicate signature
pub type Predicate = Arc<dyn Fn(&AccessRequest<'_>) -> bool + Send + Sync>;

/// Authorization policy for an operation
#[derive(Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Nobody may perform the operation
    Deny,

    /// Any authenticated caller
    Authenticated,

    /// Owner of the addressed resource instance only
    Owner,

    /// User must have one of these roles
    HasRole(Vec<String>),

    /// Service-to-service only
    ServiceOnly,

    /// Admin only
    AdminOnly,

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom predicate
    Custom(Predicate),
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPolicy::Public => write!(f, "Public"),
            AuthPolicy::Deny => write!(f, "Deny"),
            AuthPolicy::Authenticated => write!(f, "Authenticated"),
            AuthPolicy::Owner => write!(f, "Owner"),
            AuthPolicy::HasRole(roles) => f.debug_tuple("HasRole").field(roles).finish(),
            AuthPolicy::ServiceOnly => write!(f, "ServiceOnly"),
            AuthPolicy::AdminOnly => write!(f, "AdminOnly"),
            AuthPolicy::And(p) => f.debug_tuple("And").field(p).finish(),
            AuthPolicy::Or(p) => f.debug_tuple("Or").field(p).finish(),
            AuthPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl AuthPolicy {
    /// Wrap a closure as a policy
    pub fn custom(predicate: impl Fn(&AccessRequest<'_>) -> bool + Send + Sync + 'static) -> Self {
        AuthPolicy::Custom(Arc::new(predicate))
    }

    /// Check if the request satisfies this policy
    pub fn check(&self, request: &AccessRequest<'_>) -> bool {
        let context = request.caller;
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Deny => false,

            AuthPolicy::Authenticated => !matches!(context, AuthContext::Anonymous),

            AuthPolicy::Owner => match context {
                AuthContext::Owner {
                    resource_type,
                    resource_key,
                    ..
                } => resource_type == request.subject && request.key == Some(resource_key),
                _ => false,
            },

            AuthPolicy::HasRole(required_roles) => required_roles.iter().any(|r| context.has_role(r)),

            AuthPolicy::ServiceOnly => context.is_service(),

            AuthPolicy::AdminOnly => context.is_admin(),

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(request)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(request)),

            AuthPolicy::Custom(f) => f(request),
        }
    }

    /// Parse policy from string (for YAML config)
    pub fn parse_policy(s: &str) -> Option<Self> {
        let policy = match s {
            "public" => AuthPolicy::Public,
            "deny" => AuthPolicy::Deny,
            "authenticated" => AuthPolicy::Authenticated,
            "owner" => AuthPolicy::Owner,
            "service_only" => AuthPolicy::ServiceOnly,
            "admin_only" => AuthPolicy::AdminOnly,
            s => match (s.strip_prefix("role:"), s.strip_prefix("owner_or_role:")) {
                (Some(role), _) if !role.is_empty() => AuthPolicy::HasRole(vec![role.to_string()]),
                (_, Some(role)) if !role.is_empty() => AuthPolicy::Or(vec![
                    AuthPolicy::Owner,
                    AuthPolicy::HasRole(vec![role.to_string()]),
                ]),
                _ => return None,
            },
        };
        Some(policy)
    }
}

/// One policy per operation kind; everything is public by default
#[derive(Debug, Clone)]
pub struct AccessRules {
    pub discover: AuthPolicy,
    pub view: AuthPolicy,
    pub list: AuthPolicy,
    pub create: AuthPolicy,
    pub update: AuthPolicy,
    pub delete: AuthPolicy,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self::uniform(AuthPolicy::Public)
    }
}

impl AccessRules {
    pub fn public() -> Self {
        Self::default()
    }

    /// The same policy for every operation
    pub fn uniform(policy: AuthPolicy) -> Self {
        Self {
            discover: policy.clone(),
            view: policy.clone(),
            list: policy.clone(),
            create: policy.clone(),
            update: policy.clone(),
            delete: policy,
        }
    }

    /// Replace the policy of one operation
    pub fn with(mut self, operation: Operation, policy: AuthPolicy) -> Self {
        *self.policy_mut(operation) = policy;
        self
    }

    pub fn policy(&self, operation: Operation) -> &AuthPolicy {
        match operation {
            Operation::Discover => &self.discover,
            Operation::View => &self.view,
            Operation::List => &self.list,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    fn policy_mut(&mut self, operation: Operation) -> &mut AuthPolicy {
        match operation {
            Operation::Discover => &mut self.discover,
            Operation::View => &mut self.view,
            Operation::List => &mut self.list,
            Operation::Create => &mut self.create,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
        }
    }

    pub fn check(&self, request: &AccessRequest<'_>) -> bool {
        self.policy(request.operation).check(request)
    }

    /// Like [`check`](Self::check), surfacing a denial as an authorization error
    pub fn require(&self, request: &AccessRequest<'_>) -> GraphResult<()> {
        if self.check(request) {
            Ok(())
        } else {
            tracing::debug!(
                subject = request.subject,
                operation = %request.operation,
                "access denied"
            );
            Err(GraphError::unauthorized(format!(
                "Operation '{}' on {} is not permitted",
                request.operation, request.subject
            )))
        }
    }
}

// =============================================================================
// Identity resolution
// =============================================================================

/// Opaque credentials handed to an [`IdentityResolver`], e.g. request headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are case-insensitive
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Trait for identity resolvers
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the caller identity from credentials
    async fn resolve(&self, credentials: &Credentials) -> GraphResult<AuthContext>;
}

/// Resolver that treats every caller as anonymous (for development)
pub struct AnonymousResolver;

#[async_trait]
impl IdentityResolver for AnonymousResolver {
    async fn resolve(&self, _credentials: &Credentials) -> GraphResult<AuthContext> {
        Ok(AuthContext::Anonymous)
    }
}

/// Resolver reading `x-admin-id`, `x-service`, `x-user-id` and `x-roles`
pub struct HeaderResolver;

impl HeaderResolver {
    fn parse_uuid(raw: &str, header: &str) -> GraphResult<Uuid> {
        Uuid::parse_str(raw)
            .map_err(|_| GraphError::unauthorized(format!("Invalid {header} header")))
    }
}

#[async_trait]
impl IdentityResolver for HeaderResolver {
    async fn resolve(&self, credentials: &Credentials) -> GraphResult<AuthContext> {
        if let Some(admin) = credentials.get("x-admin-id") {
            return Ok(AuthContext::Admin {
                admin_id: Self::parse_uuid(admin, "x-admin-id")?,
            });
        }
        if let Some(service) = credentials.get("x-service") {
            return Ok(AuthContext::Service {
                service_name: service.to_string(),
            });
        }
        match credentials.get("x-user-id") {
            Some(user) => Ok(AuthContext::User {
                user_id: Self::parse_uuid(user, "x-user-id")?,
                roles: credentials
                    .get("x-roles")
                    .map(|roles| {
                        roles
                            .split(',')
                            .map(str::trim)
                            .filter(|r| !r.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            None => Ok(AuthContext::Anonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> AuthContext {
        AuthContext::User {
            user_id: Uuid::new_v4(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn check(policy: &AuthPolicy, caller: &AuthContext) -> bool {
        policy.check(&AccessRequest::new(caller, Operation::View, "Source"))
    }

    #[test]
    fn test_policy_check() {
        let user_context = user(&["admin"]);
        assert!(check(&AuthPolicy::Authenticated, &user_context));
        assert!(check(&AuthPolicy::HasRole(vec!["admin".into()]), &user_context));
        assert!(!check(&AuthPolicy::Owner, &user_context));

        let anon_context = AuthContext::Anonymous;
        assert!(check(&AuthPolicy::Public, &anon_context));
        assert!(!check(&AuthPolicy::Authenticated, &anon_context));
        assert!(!check(&AuthPolicy::Deny, &anon_context));
    }

    #[test]
    fn test_policy_check_and_or() {
        let ctx = user(&["viewer"]);
        let and = AuthPolicy::And(vec![
            AuthPolicy::Authenticated,
            AuthPolicy::HasRole(vec!["admin".into()]),
        ]);
        assert!(!check(&and, &ctx));

        let or = AuthPolicy::Or(vec![AuthPolicy::ServiceOnly, AuthPolicy::AdminOnly]);
        assert!(check(&or, &AuthContext::Admin { admin_id: Uuid::new_v4() }));
        assert!(!check(&or, &ctx));
    }

    #[test]
    fn test_owner_policy_matches_subject_and_key() {
        let key = Key::Integer(1);
        let owner = AuthContext::Owner {
            user_id: Uuid::new_v4(),
            resource_type: "Source".into(),
            resource_key: key.clone(),
        };
        let other = Key::Integer(2);
        let request = AccessRequest::new(&owner, Operation::Update, "Source");
        assert!(AuthPolicy::Owner.check(&request.key(Some(&key))));
        assert!(!AuthPolicy::Owner.check(&request.key(Some(&other))));
        assert!(!AuthPolicy::Owner.check(&AccessRequest::new(&owner, Operation::Update, "Target").key(Some(&key))));
    }

    #[test]
    fn test_custom_policy_sees_request() {
        let policy = AuthPolicy::custom(|request| {
            request.key.is_some_and(|key| *key == Key::Integer(1))
        });
        let caller = AuthContext::Anonymous;
        let one = Key::Integer(1);
        let request = AccessRequest::new(&caller, Operation::Discover, "Source");
        assert!(policy.check(&request.key(Some(&one))));
        assert!(!policy.check(&request));
    }

    #[test]
    fn test_parse_policy() {
        assert!(matches!(AuthPolicy::parse_policy("public"), Some(AuthPolicy::Public)));
        assert!(matches!(AuthPolicy::parse_policy("deny"), Some(AuthPolicy::Deny)));
        match AuthPolicy::parse_policy("role:admin") {
            Some(AuthPolicy::HasRole(roles)) => assert_eq!(roles, vec!["admin"]),
            other => panic!("Expected HasRole, got {other:?}"),
        }
        match AuthPolicy::parse_policy("owner_or_role:manager") {
            Some(AuthPolicy::Or(policies)) => assert_eq!(policies.len(), 2),
            other => panic!("Expected Or policy, got {other:?}"),
        }
        assert!(AuthPolicy::parse_policy("publc").is_none());
        assert!(AuthPolicy::parse_policy("role:").is_none());
    }

    #[test]
    fn test_access_rules_override_one_operation() {
        let rules = AccessRules::public().with(Operation::Delete, AuthPolicy::Deny);
        let caller = AuthContext::Anonymous;
        assert!(rules.check(&AccessRequest::new(&caller, Operation::View, "Source")));
        assert!(!rules.check(&AccessRequest::new(&caller, Operation::Delete, "Source")));
    }

    #[tokio::test]
    async fn test_header_resolver() {
        let id = Uuid::new_v4();
        let credentials = Credentials::new()
            .with("X-User-Id", id.to_string())
            .with("x-roles", "editor, viewer");
        let context = HeaderResolver.resolve(&credentials).await.unwrap();
        assert_eq!(context.user_id(), Some(id));
        assert!(context.has_role("viewer"));

        let anonymous = HeaderResolver.resolve(&Credentials::new()).await.unwrap();
        assert_eq!(anonymous, AuthContext::Anonymous);

        let bad = Credentials::new().with("x-user-id", "nope");
        assert!(matches!(
            HeaderResolver.resolve(&bad).await,
            Err(GraphError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_anonymous_resolver() {
        let context = AnonymousResolver.resolve(&Credentials::new()).await.unwrap();
        assert_eq!(context, AuthContext::Anonymous);
    }
}
