//! Primary-key policies
//!
//! A policy decides how a resource instance is keyed: derived from the
//! payload, or generated by the storage backend.

use crate::core::error::ValidationError;
use crate::core::field::{Document, Key};
use crate::core::schema::{FieldKind, FieldType, Schema};
use serde_json::{Value, json};
use std::fmt;
use uuid::Uuid;

/// Strategy producing and decoding primary keys
pub trait KeyPolicy: Send + Sync + fmt::Debug {
    /// Short name used in schema documents
    fn kind(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Declaration-time check against the resource schema
    fn validate(&self, _schema: &Schema) -> Result<(), String> {
        Ok(())
    }

    /// Key for a new instance; `None` asks the backend to generate one
    fn generate(&self, schema: &Schema, data: &Document) -> Option<Key>;

    /// Record a key produced by `generate` in the document about to be stored
    fn assign(&self, _schema: &Schema, _data: &mut Document, _key: &Key) {}

    /// Decode a key supplied by a caller
    fn deserialize(&self, schema: &Schema, raw: &Value) -> Result<Key, ValidationError>;

    fn serialize(&self, _schema: &Schema, key: &Key) -> Value {
        key.to_json()
    }

    fn describe(&self) -> Value {
        json!({ "type": self.kind(), "description": self.description() })
    }
}

/// Key taken from the single schema field marked `pk`
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldKeyPolicy;

impl FieldKeyPolicy {
    fn key_field(schema: &Schema) -> Option<(&str, &crate::core::schema::Field)> {
        schema.fields().find(|(_, field)| field.is_pk())
    }
}

impl KeyPolicy for FieldKeyPolicy {
    fn kind(&self) -> &str {
        "pk_field"
    }

    fn description(&self) -> &str {
        "Key is the value of the field marked as pk"
    }

    fn validate(&self, schema: &Schema) -> Result<(), String> {
        let keys = schema.find_fields(|field| field.is_pk());
        match keys.as_slice() {
            [] => Err("PK field is not defined".to_string()),
            [name] => match schema.get(name).map(|f| (f.kind(), f.is_required())) {
                Some((FieldKind::Scalar(FieldType::Uuid), _)) => Ok(()),
                Some((FieldKind::Scalar(FieldType::Integer | FieldType::String), true)) => Ok(()),
                Some((FieldKind::Scalar(FieldType::Integer | FieldType::String), false)) => Err(
                    format!("PK field '{name}' can only be optional or readonly if it is a uuid field"),
                ),
                _ => Err(format!("PK field '{name}' must be an int, string or uuid field")),
            },
            many => Err(format!("Multiple PKs found: {}", many.join(", "))),
        }
    }

    /// A missing uuid pk gets a fresh v4 value
    fn generate(&self, schema: &Schema, data: &Document) -> Option<Key> {
        let (name, field) = Self::key_field(schema)?;
        match data.get(name) {
            Some(value) => Key::from_value(value),
            None if matches!(field.kind(), FieldKind::Scalar(FieldType::Uuid)) => {
                Some(Key::Uuid(Uuid::new_v4()))
            }
            None => None,
        }
    }

    fn assign(&self, schema: &Schema, data: &mut Document, key: &Key) {
        let Some((name, _)) = Self::key_field(schema) else {
            return;
        };
        if data.contains_key(name) {
            return;
        }
        let position = schema
            .fields()
            .take_while(|(field, _)| *field != name)
            .filter(|(field, _)| data.contains_key(*field))
            .count();
        data.shift_insert(position, name.to_string(), key.to_value());
    }

    fn deserialize(&self, schema: &Schema, raw: &Value) -> Result<Key, ValidationError> {
        let (_, field) = Self::key_field(schema)
            .ok_or_else(|| ValidationError::message("PK field is not defined"))?;
        let value = field.deserialize(raw)?;
        Key::from_value(&value).ok_or_else(|| ValidationError::message("Value cannot serve as a key"))
    }
}

/// Keys are always generated by the backend
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneratedKeyPolicy;

impl KeyPolicy for GeneratedKeyPolicy {
    fn kind(&self) -> &str {
        "generated"
    }

    fn description(&self) -> &str {
        "Key is generated by the storage backend"
    }

    fn generate(&self, _schema: &Schema, _data: &Document) -> Option<Key> {
        None
    }

    fn deserialize(&self, _schema: &Schema, raw: &Value) -> Result<Key, ValidationError> {
        match raw {
            Value::Number(n) => n
                .as_i64()
                .map(Key::Integer)
                .ok_or_else(|| ValidationError::message("Key has to be an integer")),
            Value::String(s) => Ok(match Uuid::parse_str(s) {
                Ok(uuid) => Key::Uuid(uuid),
                Err(_) => match s.parse::<i64>() {
                    Ok(i) => Key::Integer(i),
                    Err(_) => Key::String(s.clone()),
                },
            }),
            _ => Err(ValidationError::message("Key has to be a string or an integer")),
        }
    }
}
