//! Configuration loading and management
//!
//! Resources can be declared in YAML instead of code:
//!
//! ```yaml
//! resources:
//!   - name: Teacher
//!     alias: teachers
//!     fields:
//!       - { name: pk, type: int, pk: true }
//!       - { name: name, type: string, max_length: 64 }
//!     links:
//!       - name: courses
//!         target: Course
//!         cardinality: MANY
//!         master: true
//!         related_name: teacher
//! ```
//!
//! Flags are checked while building declarations, so a malformed flag or
//! cardinality is reported as a declaration error naming the broken rule.

use crate::core::auth::{AccessRules, AuthPolicy, Operation};
use crate::core::error::{DeclarationError, DeclarationRule};
use crate::core::field::FieldFormat;
use crate::core::key::GeneratedKeyPolicy;
use crate::core::link::{Cardinality, LinkDeclaration};
use crate::core::resource::ResourceDeclaration;
use crate::core::schema::{Field, FieldType, Schema};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use validator::Validate;

/// Policy string per operation kind; absent operations stay public
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    pub discover: Option<String>,
    pub view: Option<String>,
    pub list: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

impl AccessConfig {
    /// Access rules; an unknown policy string is a declaration error naming `subject`
    pub fn to_rules(&self, subject: &str) -> Result<AccessRules, DeclarationError> {
        let entries = [
            (Operation::Discover, &self.discover),
            (Operation::View, &self.view),
            (Operation::List, &self.list),
            (Operation::Create, &self.create),
            (Operation::Update, &self.update),
            (Operation::Delete, &self.delete),
        ];
        entries
            .into_iter()
            .try_fold(AccessRules::default(), |rules, (operation, policy)| {
                let Some(policy) = policy else {
                    return Ok(rules);
                };
                let parsed = AuthPolicy::parse_policy(policy).ok_or_else(|| {
                    DeclarationError::invalid(
                        subject,
                        DeclarationRule::InvalidPolicy,
                        format!("unknown access policy '{policy}' for {operation}"),
                    )
                })?;
                Ok(rules.with(operation, parsed))
            })
    }
}

/// A field and its constraints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FieldConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Scalar type name, `list` or `dict`
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub kind: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub required: Option<serde_yaml::Value>,
    #[serde(default)]
    pub readonly: Option<serde_yaml::Value>,
    #[serde(default)]
    pub changeable: Option<serde_yaml::Value>,
    #[serde(default)]
    pub pk: Option<serde_yaml::Value>,

    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub min: Option<Value>,
    #[serde(default)]
    pub max: Option<Value>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub choice_labels: Option<Vec<String>>,
    #[serde(default)]
    pub invalid_choices: Option<Vec<Value>>,

    /// Item field of a `list`
    #[serde(default)]
    pub item: Option<Box<FieldConfig>>,

    /// Sub-fields of a `dict`
    #[serde(default)]
    #[validate(nested)]
    pub fields: Vec<FieldConfig>,
}

/// One side of a relation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinkConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub target: String,

    #[serde(default = "default_cardinality")]
    pub cardinality: String,

    #[serde(default)]
    pub related_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub master: Option<serde_yaml::Value>,
    #[serde(default)]
    pub required: Option<serde_yaml::Value>,
    #[serde(default)]
    pub one_way: Option<serde_yaml::Value>,
    #[serde(default)]
    pub readonly: Option<serde_yaml::Value>,
    #[serde(default)]
    pub changeable: Option<serde_yaml::Value>,

    /// Payload fields, meaningful on the master side
    #[serde(default)]
    #[validate(nested)]
    pub fields: Vec<FieldConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub query_fields: Vec<FieldConfig>,

    #[serde(default)]
    pub access: AccessConfig,
}

fn default_cardinality() -> String {
    Cardinality::Many.as_str().to_string()
}

/// Key policy of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyConfig {
    /// The field marked `pk`
    #[default]
    Field,
    /// Generated by the storage backend
    Generated,
}

/// A resource and its links
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResourceConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Name used by callers; defaults to `name`
    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub key: KeyConfig,

    /// Let undeclared fields through unvalidated
    #[serde(default)]
    pub wildcard: bool,

    #[serde(default)]
    #[validate(nested)]
    pub fields: Vec<FieldConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub query_fields: Vec<FieldConfig>,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    #[validate(nested)]
    pub links: Vec<LinkConfig>,
}

/// Complete configuration of a resource graph
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GraphConfig {
    #[validate(nested)]
    pub resources: Vec<ResourceConfig>,
}

impl GraphConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge several configurations; later resources with the same name win
    pub fn merge(configs: Vec<GraphConfig>) -> Self {
        let mut merged: Vec<ResourceConfig> = Vec::new();
        for resource in configs.into_iter().flat_map(|config| config.resources) {
            match merged.iter_mut().find(|existing| existing.name == resource.name) {
                Some(existing) => *existing = resource,
                None => merged.push(resource),
            }
        }
        Self { resources: merged }
    }

    /// Build declarations, paired with the alias each is registered under
    pub fn into_declarations(self) -> Result<Vec<(String, ResourceDeclaration)>, DeclarationError> {
        self.resources
            .into_iter()
            .map(|resource| {
                let alias = resource.alias.clone().unwrap_or_else(|| resource.name.clone());
                Ok((alias, resource.into_declaration()?))
            })
            .collect()
    }
}

impl ResourceConfig {
    pub fn into_declaration(self) -> Result<ResourceDeclaration, DeclarationError> {
        let subject = self.name.clone();
        let mut schema = build_schema(&subject, &self.fields)?;
        if self.wildcard {
            schema = schema.allow_additional_fields();
        }

        let mut declaration = ResourceDeclaration::new(&self.name)
            .schema(schema)
            .query_schema(build_schema(&subject, &self.query_fields)?)
            .access(self.access.to_rules(&subject)?);
        if let Some(description) = &self.description {
            declaration = declaration.description(description);
        }
        if self.key == KeyConfig::Generated {
            declaration = declaration.key_policy(GeneratedKeyPolicy);
        }

        for link in self.links {
            declaration = declaration.link(link.into_declaration(&subject)?);
        }
        Ok(declaration)
    }
}

impl LinkConfig {
    pub fn into_declaration(self, source: &str) -> Result<LinkDeclaration, DeclarationError> {
        let subject = format!("{source}:{}", self.name);
        let cardinality = Cardinality::parse(&self.cardinality).map_err(|_| {
            DeclarationError::invalid(
                &subject,
                DeclarationRule::InvalidCardinality,
                format!("cardinality must be ONE or MANY, got '{}'", self.cardinality),
            )
        })?;

        let mut link = LinkDeclaration::new(&self.name, &self.target, cardinality)
            .schema(build_schema(&subject, &self.fields)?)
            .query_schema(build_schema(&subject, &self.query_fields)?)
            .access(self.access.to_rules(&subject)?);

        if let Some(related) = &self.related_name {
            link = link.related_name(related);
        }
        if let Some(description) = &self.description {
            link = link.description(description);
        }
        if flag(&subject, "one_way", &self.one_way, false)? {
            link = link.one_way();
        }
        if flag(&subject, "master", &self.master, false)? {
            link = link.master();
        }
        if flag(&subject, "required", &self.required, false)? {
            link = link.required();
        }
        if flag(&subject, "readonly", &self.readonly, false)? {
            link = link.readonly();
        }
        if !flag(&subject, "changeable", &self.changeable, true)? {
            link = link.unchangeable();
        }
        Ok(link)
    }
}

/// A boolean flag; anything but a YAML boolean is a declaration error
fn flag(
    subject: &str,
    name: &str,
    value: &Option<serde_yaml::Value>,
    default: bool,
) -> Result<bool, DeclarationError> {
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(default),
        Some(serde_yaml::Value::Bool(value)) => Ok(*value),
        Some(_) => Err(DeclarationError::invalid(
            subject,
            DeclarationRule::InvalidFlag,
            format!("'{name}' has to be a boolean"),
        )),
    }
}

fn build_schema(subject: &str, fields: &[FieldConfig]) -> Result<Schema, DeclarationError> {
    fields.iter().try_fold(Schema::new(), |schema, config| {
        Ok(schema.field(&config.name, build_field(subject, config)?))
    })
}

fn build_field(subject: &str, config: &FieldConfig) -> Result<Field, DeclarationError> {
    let scope = format!("{subject}.{}", config.name);
    let invalid = |message: String| {
        DeclarationError::invalid(&scope, DeclarationRule::FieldConstraint, message)
    };

    let mut field = match config.kind.as_str() {
        "list" => {
            let item = config
                .item
                .as_deref()
                .ok_or_else(|| invalid("list fields need an item".to_string()))?;
            Field::list(build_field(&scope, item)?)
        }
        "dict" => Field::object(build_schema(&scope, &config.fields)?),
        other => FieldType::parse(other)
            .map(Field::from)
            .ok_or_else(|| invalid(format!("unknown field type '{other}'")))?,
    };

    if let Some(description) = &config.description {
        field = field.description(description);
    }
    field = field.required(flag(&scope, "required", &config.required, true)?);
    field = field.changeable(flag(&scope, "changeable", &config.changeable, true)?);
    if flag(&scope, "readonly", &config.readonly, false)? {
        field = field.readonly();
    }
    if flag(&scope, "pk", &config.pk, false)? {
        field = field.pk();
    }
    if let Some(default) = &config.default {
        field = field.default(default.clone());
    }
    if let Some(min) = &config.min {
        field = field.min(min.clone());
    }
    if let Some(max) = &config.max {
        field = field.max(max.clone());
    }
    if let Some(length) = config.min_length {
        field = field.min_length(length);
    }
    if let Some(length) = config.max_length {
        field = field.max_length(length);
    }
    if let Some(pattern) = &config.pattern {
        field = field.pattern(pattern);
    }
    if let Some(format) = &config.format {
        let format = FieldFormat::parse(format)
            .ok_or_else(|| invalid(format!("unknown format '{format}'")))?;
        field = field.format(format);
    }
    if let Some(choices) = &config.choices {
        field = field.choices(choices.iter().cloned());
    }
    if let Some(labels) = &config.choice_labels {
        field = field.choice_labels(labels.iter().cloned());
    }
    if let Some(invalid_choices) = &config.invalid_choices {
        field = field.invalid_choices(invalid_choices.iter().cloned());
    }
    Ok(field)
}
