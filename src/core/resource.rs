//! Resource declarations

use crate::core::auth::AccessRules;
use crate::core::error::{DeclarationError, DeclarationRule};
use crate::core::key::{FieldKeyPolicy, KeyPolicy};
use crate::core::link::LinkDeclaration;
use crate::core::schema::Schema;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A named entity type: its schemas, key policy, links and access rules
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) schema: Schema,
    pub(crate) query_schema: Schema,
    pub(crate) key_policy: Arc<dyn KeyPolicy>,
    pub(crate) links: IndexMap<String, LinkDeclaration>,
    pub(crate) access: AccessRules,
    pub(crate) meta: Map<String, Value>,
}

impl ResourceDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema: Schema::new(),
            query_schema: Schema::new(),
            key_policy: Arc::new(FieldKeyPolicy),
            links: IndexMap::new(),
            access: AccessRules::default(),
            meta: Map::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Primary data schema; readonly fields lose required and default
    pub fn schema(mut self, mut schema: Schema) -> Self {
        schema.strip_readonly();
        self.schema = schema;
        self
    }

    /// Schema of filter parameters
    pub fn query_schema(mut self, schema: Schema) -> Self {
        self.query_schema = schema;
        self
    }

    pub fn key_policy(mut self, policy: impl KeyPolicy + 'static) -> Self {
        self.key_policy = Arc::new(policy);
        self
    }

    /// Add an outgoing link; a later link with the same name replaces it
    pub fn link(mut self, mut link: LinkDeclaration) -> Self {
        link.source = self.name.clone();
        self.links.insert(link.name.clone(), link);
        self
    }

    pub fn access(mut self, access: AccessRules) -> Self {
        self.access = access;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    // ---- accessors ------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resource_query_schema(&self) -> &Schema {
        &self.query_schema
    }

    pub fn policy(&self) -> &dyn KeyPolicy {
        self.key_policy.as_ref()
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkDeclaration> {
        self.links.values()
    }

    pub fn get_link(&self, name: &str) -> Option<&LinkDeclaration> {
        self.links.get(name)
    }

    pub fn access_rules(&self) -> &AccessRules {
        &self.access
    }

    /// Registration-time checks: field constraints and key policy
    pub(crate) fn validate(&self) -> Result<(), DeclarationError> {
        if self.name.is_empty() {
            return Err(DeclarationError::invalid(
                "<unnamed>",
                DeclarationRule::InvalidFlag,
                "resource name is empty",
            ));
        }
        if let Err((field, issue)) = self.schema.first_declaration_issue() {
            return Err(DeclarationError::invalid(
                &self.name,
                DeclarationRule::FieldConstraint,
                format!("{field}: {issue}"),
            ));
        }
        if let Err((field, issue)) = self.query_schema.first_declaration_issue() {
            return Err(DeclarationError::invalid(
                &self.name,
                DeclarationRule::FieldConstraint,
                format!("query {field}: {issue}"),
            ));
        }
        self.key_policy
            .validate(&self.schema)
            .map_err(|issue| DeclarationError::invalid(&self.name, DeclarationRule::KeyPolicy, issue))
    }
}
