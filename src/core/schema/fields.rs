//! Field declarations
//!
//! A [`Field`] couples a kind (integer, string, list of ..., nested object)
//! with its metadata (required, default, readonly, changeable, pk) and its
//! value constraints. Constraints are enforced on every deserialization;
//! [`Field::validate_declaration`] only checks that they are consistent.

use super::Schema;
use super::temporal;
use crate::core::error::ValidationError;
use crate::core::field::{FieldFormat, FieldValue};
use crate::core::validation::{Check, validators};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Scalar field types, also reachable through their short names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    String,
    Boolean,
    DateTime,
    Date,
    Time,
    Duration,
    Uuid,
}

impl FieldType {
    /// Resolve a primitive shortcut (`int`, `str`, `bool`, ...)
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(FieldType::Integer),
            "float" => Some(FieldType::Float),
            "str" | "string" => Some(FieldType::String),
            "bool" | "boolean" => Some(FieldType::Boolean),
            "datetime" => Some(FieldType::DateTime),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "duration" => Some(FieldType::Duration),
            "uuid" => Some(FieldType::Uuid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Boolean => "bool",
            FieldType::DateTime => "datetime",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Duration => "duration",
            FieldType::Uuid => "uuid",
        }
    }
}

/// What a field holds
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(FieldType),
    List(Box<Field>),
    Object(Schema),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Scalar(t) => t.name(),
            FieldKind::List(_) => "list",
            FieldKind::Object(_) => "dict",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Scalar(FieldType::Integer) | FieldKind::Scalar(FieldType::Float)
        )
    }

    fn is_string(&self) -> bool {
        matches!(self, FieldKind::Scalar(FieldType::String))
    }
}

/// A typed slot in a [`Schema`]
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    description: Option<String>,
    required: bool,
    default: Option<Value>,
    readonly: bool,
    changeable: bool,
    pk: bool,
    min: Option<Value>,
    max: Option<Value>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    format: Option<FieldFormat>,
    choices: Option<Vec<Value>>,
    choice_labels: Option<Vec<String>>,
    invalid_choices: Option<Vec<Value>>,
    extra: Map<String, Value>,
    /// Problems noticed while building, reported by `validate_declaration`
    issues: Vec<String>,
}

impl Field {
    fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            description: None,
            required: true,
            default: None,
            readonly: false,
            changeable: true,
            pk: false,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
            choices: None,
            choice_labels: None,
            invalid_choices: None,
            extra: Map::new(),
            issues: Vec::new(),
        }
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Integer))
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Float))
    }

    pub fn string() -> Self {
        Self::new(FieldKind::Scalar(FieldType::String))
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Boolean))
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::Scalar(FieldType::DateTime))
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Date))
    }

    pub fn time() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Time))
    }

    pub fn duration() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Duration))
    }

    pub fn uuid() -> Self {
        Self::new(FieldKind::Scalar(FieldType::Uuid))
    }

    /// A list whose elements all validate against `item`
    pub fn list(item: impl Into<Field>) -> Self {
        Self::new(FieldKind::List(Box::new(item.into())))
    }

    /// A nested document validated by `schema`
    pub fn object(schema: Schema) -> Self {
        Self::new(FieldKind::Object(schema))
    }

    // ---- metadata -------------------------------------------------------

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
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

    pub fn changeable(mut self, changeable: bool) -> Self {
        self.changeable = changeable;
        self
    }

    /// Mark the field as the primary key source; keys never change
    pub fn pk(mut self) -> Self {
        self.pk = true;
        self.changeable = false;
        self
    }

    /// Attach descriptive metadata reported by `describe`
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    // ---- constraints ----------------------------------------------------

    pub fn min(mut self, value: impl Into<Value>) -> Self {
        self.require_numeric("min_val");
        self.min = Some(value.into());
        self
    }

    pub fn max(mut self, value: impl Into<Value>) -> Self {
        self.require_numeric("max_val");
        self.max = Some(value.into());
        self
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.require_string("min_length");
        self.min_length = Some(length);
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.require_string("max_length");
        self.max_length = Some(length);
        self
    }

    /// Pattern the value must match from its first character
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.require_string("regex");
        match Regex::new(pattern) {
            Ok(regex) => self.pattern = Some(regex),
            Err(e) => self.issues.push(format!("regex '{pattern}' is invalid: {e}")),
        }
        self
    }

    pub fn format(mut self, format: FieldFormat) -> Self {
        self.require_string("format");
        self.format = Some(format);
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.require_indexable("choices");
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn choice_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choice_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn invalid_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.require_indexable("invalid_choices");
        self.invalid_choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    fn require_numeric(&mut self, constraint: &str) {
        if !self.kind.is_numeric() {
            self.issues.push(format!(
                "{constraint} does not apply to {} fields",
                self.kind.type_name()
            ));
        }
    }

    fn require_string(&mut self, constraint: &str) {
        if !self.kind.is_string() {
            self.issues.push(format!(
                "{constraint} does not apply to {} fields",
                self.kind.type_name()
            ));
        }
    }

    fn require_indexable(&mut self, constraint: &str) {
        if !(self.kind.is_numeric() || self.kind.is_string()) {
            self.issues.push(format!(
                "{constraint} does not apply to {} fields",
                self.kind.type_name()
            ));
        }
    }

    // ---- accessors ------------------------------------------------------

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_changeable(&self) -> bool {
        self.changeable
    }

    pub fn is_pk(&self) -> bool {
        self.pk
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Readonly fields are never required and never defaulted
    pub(crate) fn strip_readonly(&mut self) {
        if self.readonly {
            self.required = false;
            self.default = None;
        }
    }

    // ---- runtime --------------------------------------------------------

    /// Coerce and validate a wire value
    pub fn deserialize(&self, raw: &Value) -> Result<FieldValue, ValidationError> {
        if raw.is_null() {
            return if self.required {
                Err(ValidationError::message(
                    "Value is required and thus cannot be None",
                ))
            } else {
                Ok(FieldValue::Null)
            };
        }

        match &self.kind {
            FieldKind::List(item) => {
                let Value::Array(items) = raw else {
                    return Err(ValidationError::message("Has to be list"));
                };
                let mut values = Vec::with_capacity(items.len());
                let mut errors = Vec::new();
                for (index, item_raw) in items.iter().enumerate() {
                    match item.deserialize(item_raw) {
                        Ok(value) => values.push(value),
                        Err(e) => errors.push((index, e)),
                    }
                }
                if errors.is_empty() {
                    Ok(FieldValue::List(values))
                } else {
                    Err(ValidationError::Items(errors))
                }
            }
            FieldKind::Object(schema) => schema.deserialize(raw).map(FieldValue::Object),
            FieldKind::Scalar(field_type) => {
                let value = coerce(*field_type, raw).map_err(ValidationError::Message)?;
                validators::run_all(&self.checks(), &value).map_err(ValidationError::Message)?;
                Ok(value)
            }
        }
    }

    /// Wire form of a previously deserialized value
    pub fn serialize(&self, value: &FieldValue) -> Value {
        match (&self.kind, value) {
            (FieldKind::List(item), FieldValue::List(items)) => {
                Value::Array(items.iter().map(|v| item.serialize(v)).collect())
            }
            (FieldKind::Object(schema), FieldValue::Object(doc)) => schema.serialize(doc),
            (_, other) => other.to_json(),
        }
    }

    /// Structural metadata for schema documents
    pub fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.kind.type_name()));
        out.insert("description".into(), json!(self.description));
        out.insert("required".into(), json!(self.required));
        out.insert("readonly".into(), json!(self.readonly));
        out.insert("changeable".into(), json!(self.changeable));
        if self.pk {
            out.insert("pk".into(), json!(true));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        let optional = [
            ("min_val", self.min.clone()),
            ("max_val", self.max.clone()),
            ("min_length", self.min_length.map(Value::from)),
            ("max_length", self.max_length.map(Value::from)),
            ("regex", self.pattern.as_ref().map(|r| json!(r.as_str()))),
            ("format", self.format.as_ref().map(|f| json!(f.name()))),
            ("choices", self.choices.clone().map(Value::Array)),
            ("choice_labels", self.choice_labels.clone().map(|l| json!(l))),
            ("invalid_choices", self.invalid_choices.clone().map(Value::Array)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                out.insert(name.into(), value);
            }
        }
        match &self.kind {
            FieldKind::List(item) => {
                out.insert("schema".into(), item.describe());
            }
            FieldKind::Object(schema) => {
                out.insert("schema".into(), schema.describe());
            }
            FieldKind::Scalar(_) => {}
        }
        for (key, value) in &self.extra {
            out.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(out)
    }

    /// Check the declared constraints against each other
    pub fn validate_declaration(&self) -> Result<(), String> {
        if let Some(issue) = self.issues.first() {
            return Err(issue.clone());
        }

        match &self.kind {
            FieldKind::List(item) => {
                item.validate_declaration().map_err(|e| format!("item: {e}"))?;
                if self.default.is_some() {
                    return Err("default is not supported for list fields".into());
                }
                return Ok(());
            }
            FieldKind::Object(schema) => {
                if let Err((name, e)) = schema.first_declaration_issue() {
                    return Err(format!("{name}: {e}"));
                }
                if self.default.is_some() {
                    return Err("default is not supported for dict fields".into());
                }
                return Ok(());
            }
            FieldKind::Scalar(_) => {}
        }

        let min = self.coerce_constraint("min_val", self.min.as_ref())?;
        let max = self.coerce_constraint("max_val", self.max.as_ref())?;
        if let (Some(min), Some(max)) = (&min, &max) {
            if min.compare(max) == Some(std::cmp::Ordering::Greater) {
                return Err("min_val is greater than max_val".into());
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err("min_length is greater than max_length".into());
            }
        }

        let choices = self.coerce_list("choices", self.choices.as_ref())?;
        let invalid = self.coerce_list("invalid_choices", self.invalid_choices.as_ref())?;
        if let Some(choices) = &choices {
            if self.min.is_some() || self.max.is_some() {
                return Err(
                    "choices and min or max value limits do not make sense together".into(),
                );
            }
            if self.min_length.is_some()
                || self.max_length.is_some()
                || self.pattern.is_some()
                || self.format.is_some()
            {
                return Err("choices and value checkers do not make sense together".into());
            }
            if let Some(invalid) = &invalid {
                if choices.iter().any(|c| invalid.contains(c)) {
                    return Err("choices and invalid_choices overlap".into());
                }
            }
        }
        match (&self.choice_labels, &choices) {
            (Some(_), None) => return Err("choice_labels are set without choices".into()),
            (Some(labels), Some(choices)) if labels.len() != choices.len() => {
                return Err("choice_labels and choices must have the same length".into());
            }
            _ => {}
        }

        if let Some(default) = &self.default {
            self.deserialize(default)
                .map_err(|e| format!("default value is invalid: {e}"))?;
        }
        Ok(())
    }

    fn coerce_constraint(&self, name: &str, raw: Option<&Value>) -> Result<Option<FieldValue>, String> {
        let (Some(raw), FieldKind::Scalar(t)) = (raw, &self.kind) else {
            return Ok(None);
        };
        coerce(*t, raw)
            .map(Some)
            .map_err(|e| format!("{name} is invalid: {e}"))
    }

    fn coerce_list(
        &self,
        name: &str,
        raw: Option<&Vec<Value>>,
    ) -> Result<Option<Vec<FieldValue>>, String> {
        let (Some(raw), FieldKind::Scalar(t)) = (raw, &self.kind) else {
            return Ok(None);
        };
        raw.iter()
            .enumerate()
            .map(|(i, v)| coerce(*t, v).map_err(|e| format!("{name}[{i}] is invalid: {e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Constraint checks in enforcement order
    fn checks(&self) -> Vec<Check> {
        let FieldKind::Scalar(t) = &self.kind else {
            return Vec::new();
        };
        let coerce_all = |values: &Vec<Value>| -> Vec<FieldValue> {
            values.iter().filter_map(|v| coerce(*t, v).ok()).collect()
        };

        let mut checks: Vec<Check> = Vec::new();
        if let Some(choices) = &self.choices {
            checks.push(Arc::new(validators::in_list(coerce_all(choices))));
        }
        if let Some(invalid) = &self.invalid_choices {
            checks.push(Arc::new(validators::not_in_list(coerce_all(invalid))));
        }
        if let Some(min) = self.min.as_ref().and_then(|v| coerce(*t, v).ok()) {
            checks.push(Arc::new(validators::min_value(min)));
        }
        if let Some(max) = self.max.as_ref().and_then(|v| coerce(*t, v).ok()) {
            checks.push(Arc::new(validators::max_value(max)));
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            checks.push(Arc::new(validators::string_length(
                self.min_length,
                self.max_length,
            )));
        }
        if let Some(regex) = &self.pattern {
            checks.push(Arc::new(validators::pattern(regex.clone())));
        }
        if let Some(format) = &self.format {
            checks.push(Arc::new(validators::format(format.clone())));
        }
        checks
    }
}

impl From<FieldType> for Field {
    fn from(field_type: FieldType) -> Self {
        Field::new(FieldKind::Scalar(field_type))
    }
}

impl From<Schema> for Field {
    fn from(schema: Schema) -> Self {
        Field::object(schema)
    }
}

/// Type coercion of a non-null wire value
fn coerce(field_type: FieldType, raw: &Value) -> Result<FieldValue, String> {
    match field_type {
        FieldType::Integer => match raw {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(FieldValue::Integer(i)),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(FieldValue::Integer(f as i64))
                }
                _ => Err(format!("Conversion of value {n} to integer failed")),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| "Has to be a digit or a string convertable to digit".to_string()),
            _ => Err("Has to be a digit or a string convertable to digit".into()),
        },
        FieldType::Float => {
            let value = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match value {
                Some(f) if f.is_finite() => Ok(FieldValue::Float(f)),
                _ => Err("Has to be a digit or a string convertable to digit".into()),
            }
        }
        FieldType::String => raw
            .as_str()
            .map(FieldValue::from)
            .ok_or_else(|| "Has to be string".to_string()),
        FieldType::Boolean => raw
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| "Has to be boolean".to_string()),
        FieldType::DateTime => temporal::parse_datetime(expect_str(raw)?).map(FieldValue::DateTime),
        FieldType::Date => temporal::parse_date(expect_str(raw)?).map(FieldValue::Date),
        FieldType::Time => temporal::parse_time(expect_str(raw)?).map(FieldValue::Time),
        FieldType::Duration => temporal::parse_duration(expect_str(raw)?).map(FieldValue::Duration),
        FieldType::Uuid => Uuid::parse_str(expect_str(raw)?)
            .map(FieldValue::Uuid)
            .map_err(|_| "Value is not a valid uuid".to_string()),
    }
}

fn expect_str(raw: &Value) -> Result<&str, String> {
    raw.as_str().ok_or_else(|| "Has to be string".to_string())
}
