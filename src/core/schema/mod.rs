//! Field/Schema layer
//!
//! A [`Schema`] is an ordered map of [`Field`]s. It turns wire documents
//! (`serde_json::Value`) into validated [`Document`]s, collecting every
//! per-field problem before failing, and renders documents back to the wire.

mod fields;
pub mod temporal;

pub use fields::{Field, FieldKind, FieldType};

use crate::core::error::{NON_FIELD_ERRORS, ValidationError};
use crate::core::field::{Document, FieldValue};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How strictly a document is deserialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializeOptions {
    /// Report declared-required fields that are absent
    pub validate_required: bool,
    /// Start from declared defaults
    pub apply_defaults: bool,
    /// Fail on errors; when false, failing fields are silently dropped
    pub with_errors: bool,
}

impl DeserializeOptions {
    /// Full documents, e.g. creation payloads
    pub const fn strict() -> Self {
        Self {
            validate_required: true,
            apply_defaults: true,
            with_errors: true,
        }
    }

    /// Partial documents, e.g. update payloads
    pub const fn partial() -> Self {
        Self {
            validate_required: false,
            apply_defaults: false,
            with_errors: true,
        }
    }

    /// Filter parameters: nothing is required and bad keys are ignored
    pub const fn lenient() -> Self {
        Self {
            validate_required: false,
            apply_defaults: true,
            with_errors: false,
        }
    }
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self::strict()
    }
}

/// An ordered set of named fields
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, Field>,
    additional_fields: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Let undeclared fields pass through unvalidated
    pub fn allow_additional_fields(mut self) -> Self {
        self.additional_fields = true;
        self
    }

    pub fn has_additional_fields(&self) -> bool {
        self.additional_fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Names of fields matching `predicate`, in declaration order
    pub fn find_fields(&self, predicate: impl Fn(&Field) -> bool) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, field)| predicate(field))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Fields a caller can never set
    pub fn readonly_fields(&self) -> Vec<String> {
        self.find_fields(Field::is_readonly)
    }

    /// Fields a caller cannot modify after creation
    pub fn unchangeable_fields(&self) -> Vec<String> {
        self.find_fields(|field| field.is_readonly() || !field.is_changeable())
    }

    pub(crate) fn strip_readonly(&mut self) {
        for field in self.fields.values_mut() {
            field.strip_readonly();
        }
    }

    /// Strict deserialization
    pub fn deserialize(&self, raw: &Value) -> Result<Document, ValidationError> {
        self.deserialize_with(raw, DeserializeOptions::strict())
    }

    pub fn deserialize_with(
        &self,
        raw: &Value,
        options: DeserializeOptions,
    ) -> Result<Document, ValidationError> {
        let Value::Object(map) = raw else {
            return Err(ValidationError::field(
                NON_FIELD_ERRORS,
                ValidationError::message("Has to be a dict"),
            ));
        };

        let mut values: IndexMap<String, FieldValue> = IndexMap::new();
        let mut extras = Document::new();
        let mut errors: BTreeMap<String, Vec<ValidationError>> = BTreeMap::new();

        if options.apply_defaults {
            for (name, field) in &self.fields {
                if let Some(default) = field.default_value() {
                    match field.deserialize(default) {
                        Ok(value) => {
                            values.insert(name.clone(), value);
                        }
                        Err(e) => errors.entry(name.clone()).or_default().push(e),
                    }
                }
            }
        }

        for (name, raw_value) in map {
            match self.fields.get(name) {
                Some(field) => match field.deserialize(raw_value) {
                    Ok(value) => {
                        values.insert(name.clone(), value);
                    }
                    Err(e) => {
                        values.shift_remove(name);
                        errors.entry(name.clone()).or_default().push(e);
                    }
                },
                None if self.additional_fields => {
                    extras.insert(name.clone(), FieldValue::from_json(raw_value));
                }
                None => errors
                    .entry(NON_FIELD_ERRORS.to_string())
                    .or_default()
                    .push(ValidationError::message(format!(
                        "Field '{name}' is not defined"
                    ))),
            }
        }

        if options.validate_required {
            for (name, field) in &self.fields {
                let missing = values.get(name).is_none_or(FieldValue::is_null);
                if field.is_required() && missing && !errors.contains_key(name) {
                    errors
                        .entry(name.clone())
                        .or_default()
                        .push(ValidationError::message("Required field is missing"));
                }
            }
        }

        if options.with_errors && !errors.is_empty() {
            return Err(ValidationError::Fields(errors));
        }

        let mut document = Document::new();
        for name in self.fields.keys() {
            if let Some(value) = values.shift_remove(name) {
                document.insert(name.clone(), value);
            }
        }
        document.extend(extras);
        Ok(document)
    }

    /// Wire form of a document; undeclared keys survive only with wildcard
    pub fn serialize(&self, document: &Document) -> Value {
        let mut out = Map::new();
        for (name, value) in document {
            match self.fields.get(name) {
                Some(field) => {
                    out.insert(name.clone(), field.serialize(value));
                }
                None if self.additional_fields => {
                    out.insert(name.clone(), value.to_json());
                }
                None => {}
            }
        }
        Value::Object(out)
    }

    /// Field name to field description
    ///
    /// Wildcard schemas also carry `has_additional_fields: true`.
    pub fn describe(&self) -> Value {
        let mut out: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.describe()))
            .collect();
        if self.additional_fields {
            out.insert("has_additional_fields".into(), Value::Bool(true));
        }
        Value::Object(out)
    }

    /// First inconsistent field declaration, if any
    pub fn first_declaration_issue(&self) -> Result<(), (String, String)> {
        for (name, field) in &self.fields {
            field
                .validate_declaration()
                .map_err(|issue| (name.clone(), issue))?;
        }
        Ok(())
    }
}
