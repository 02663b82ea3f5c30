//! Link declarations
//!
//! A link is a named, directed relation from a source resource to a target
//! resource. Two-way relations are declared on both sides and paired at
//! setup through `related_name`; exactly one side is the master and owns
//! the relation payload.

use crate::core::auth::AccessRules;
use crate::core::error::{DeclarationError, DeclarationRule};
use crate::core::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// How many targets a link may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Parse `ONE` / `MANY`
    pub fn parse(raw: &str) -> Result<Self, DeclarationError> {
        match raw {
            "ONE" => Ok(Cardinality::One),
            "MANY" => Ok(Cardinality::Many),
            other => Err(DeclarationError::invalid(
                other,
                DeclarationRule::InvalidCardinality,
                "cardinality must be ONE or MANY",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::One => "ONE",
            Cardinality::Many => "MANY",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one side of a relation
#[derive(Debug, Clone)]
pub struct LinkDeclaration {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) cardinality: Cardinality,
    pub(crate) master: bool,
    pub(crate) required: bool,
    pub(crate) one_way: bool,
    pub(crate) readonly: bool,
    pub(crate) changeable: bool,
    pub(crate) related_name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) schema: Schema,
    pub(crate) query_schema: Schema,
    pub(crate) access: AccessRules,
    pub(crate) meta: Map<String, Value>,
}

impl LinkDeclaration {
    /// Declare a link with the given cardinality
    pub fn new(name: impl Into<String>, target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            source: String::new(),
            target: target.into(),
            cardinality,
            master: false,
            required: false,
            one_way: false,
            readonly: false,
            changeable: true,
            related_name: None,
            description: None,
            schema: Schema::new(),
            query_schema: Schema::new(),
            access: AccessRules::default(),
            meta: Map::new(),
        }
    }

    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::One)
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::Many)
    }

    /// Name of the mirror link on the target resource
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    pub fn master(mut self) -> Self {
        self.master = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// One-way links have no mirror and are always master
    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self.master = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn unchangeable(mut self) -> Self {
        self.changeable = false;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Schema of the relation payload (only meaningful on the master side)
    pub fn schema(mut self, mut schema: Schema) -> Self {
        schema.strip_readonly();
        self.schema = schema;
        self
    }

    pub fn query_schema(mut self, schema: Schema) -> Self {
        self.query_schema = schema;
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

    /// Resource declaring this link; set at registration
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_master(&self) -> bool {
        self.master
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_one_way(&self) -> bool {
        self.one_way
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_changeable(&self) -> bool {
        self.changeable
    }

    pub fn related(&self) -> Option<&str> {
        self.related_name.as_deref()
    }

    pub fn link_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn link_query_schema(&self) -> &Schema {
        &self.query_schema
    }

    pub fn access_rules(&self) -> &AccessRules {
        &self.access
    }

    /// Globally unique name, `Source:link`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source, self.name)
    }

    /// Required and cardinality ONE: the slot may never be emptied
    pub fn is_required_one(&self) -> bool {
        self.required && self.cardinality == Cardinality::One
    }

    /// Checks that need nothing but this declaration
    pub(crate) fn validate_local(&self) -> Result<(), DeclarationError> {
        let subject = self.qualified_name();
        if self.target.is_empty() {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::MissingTarget,
                "target is not defined",
            ));
        }
        if !self.one_way && self.related_name.as_deref().is_none_or(str::is_empty) {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::MissingRelatedName,
                "related_name is not defined",
            ));
        }
        if self.one_way && !self.master {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::InvalidFlag,
                "one way links are always master",
            ));
        }
        if self.required && self.cardinality == Cardinality::Many {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::RequiredToMany,
                "Link to many can't be required",
            ));
        }
        if let Err((field, issue)) = self.schema.first_declaration_issue() {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::FieldConstraint,
                format!("{field}: {issue}"),
            ));
        }
        if let Err((field, issue)) = self.query_schema.first_declaration_issue() {
            return Err(DeclarationError::invalid(
                subject,
                DeclarationRule::FieldConstraint,
                format!("query {field}: {issue}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Field;

    fn declared(link: LinkDeclaration) -> LinkDeclaration {
        let mut link = link;
        link.source = "Source".into();
        link
    }

    #[test]
    fn test_cardinality_parse() {
        assert_eq!(Cardinality::parse("ONE").unwrap(), Cardinality::One);
        assert_eq!(Cardinality::parse("MANY").unwrap(), Cardinality::Many);
        let err = Cardinality::parse("SOME").unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::InvalidCardinality));
    }

    #[test]
    fn test_one_way_forces_master() {
        let link = LinkDeclaration::to_many("tags", "Tag").one_way();
        assert!(link.is_master());
        assert!(declared(link).validate_local().is_ok());
    }

    #[test]
    fn test_two_way_needs_related_name() {
        let err = declared(LinkDeclaration::to_many("targets", "Target"))
            .validate_local()
            .unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::MissingRelatedName));
    }

    #[test]
    fn test_required_to_many_rejected() {
        let err = declared(
            LinkDeclaration::to_many("targets", "Target")
                .related_name("sources")
                .required(),
        )
        .validate_local()
        .unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::RequiredToMany));
        assert!(err.to_string().contains("Link to many can't be required"));
    }

    #[test]
    fn test_payload_schema_is_checked() {
        let err = declared(
            LinkDeclaration::to_one("owner", "User")
                .one_way()
                .schema(Schema::new().field("since", Field::integer().min(3).max(1))),
        )
        .validate_local()
        .unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::FieldConstraint));
    }

    #[test]
    fn test_qualified_name() {
        let link = declared(LinkDeclaration::to_one("the_target", "Target").related_name("x"));
        assert_eq!(link.qualified_name(), "Source:the_target");
        assert!(!link.is_required_one());
    }
}
