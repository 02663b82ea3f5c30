//! Field value types, keys and documents

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// A validated document: field name to value, in declaration order
pub type Document = IndexMap<String, FieldValue>;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Uuid(Uuid),
    /// Naive timestamp, always expressed in UTC
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(TimeDelta),
    List(Vec<FieldValue>),
    Object(Document),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a UUID if possible
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Untyped conversion used for undeclared (wildcard) fields
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => FieldValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Untyped wire form
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::DateTime(dt) => Value::String(format_datetime(dt)),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Time(t) => Value::String(format_time(t)),
            FieldValue::Duration(d) => Value::String(format_duration(d)),
            FieldValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            FieldValue::Object(doc) => Value::Object(document_to_json(doc)),
        }
    }

    /// Ordering between comparable scalars, used by range checks
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Integer(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// Untyped wire form of a whole document
pub fn document_to_json(doc: &Document) -> Map<String, Value> {
    doc.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    format!("{}{}", dt.format("%Y-%m-%dT%H:%M:%S"), fraction(dt.nanosecond()))
}

pub(crate) fn format_time(t: &NaiveTime) -> String {
    format!("{}{}", t.format("%H:%M:%S"), fraction(t.nanosecond()))
}

fn fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

/// Canonical ISO 8601 rendering, e.g. `P105DT9H52M49.448422S`
pub(crate) fn format_duration(d: &TimeDelta) -> String {
    let negative = *d < TimeDelta::zero();
    let d = d.abs();
    let days = d.num_days();
    let rest = d - TimeDelta::days(days);
    let hours = rest.num_hours();
    let minutes = (rest - TimeDelta::hours(hours)).num_minutes();
    let seconds = rest - TimeDelta::hours(hours) - TimeDelta::minutes(minutes);
    let whole = seconds.num_seconds();
    let nanos = seconds.subsec_nanos().unsigned_abs();

    let mut out = String::from(if negative { "-P" } else { "P" });
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours != 0 || minutes != 0 || whole != 0 || nanos != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if whole != 0 || nanos != 0 {
            out.push_str(&format!("{whole}{}S", fraction(nanos)));
        }
    }
    if out.ends_with('P') {
        out.push_str("0D");
    }
    out
}

// =============================================================================
// Keys
// =============================================================================

/// Primary key of a resource instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Key {
    Integer(i64),
    String(String),
    Uuid(Uuid),
}

impl Key {
    /// Key for a validated field value, if the value can serve as one
    pub fn from_value(value: &FieldValue) -> Option<Key> {
        match value {
            FieldValue::Integer(i) => Some(Key::Integer(*i)),
            FieldValue::String(s) => Some(Key::String(s.clone())),
            FieldValue::Uuid(u) => Some(Key::Uuid(*u)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> FieldValue {
        match self {
            Key::Integer(i) => FieldValue::Integer(*i),
            Key::String(s) => FieldValue::String(s.clone()),
            Key::Uuid(u) => FieldValue::Uuid(*u),
        }
    }

    pub fn to_json(&self) -> Value {
        self.to_value().to_json()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(i) => write!(f, "{i}"),
            Key::String(s) => write!(f, "{s}"),
            Key::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Integer(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.to_string())
    }
}

impl From<Uuid> for Key {
    fn from(value: Uuid) -> Self {
        Key::Uuid(value)
    }
}

// =============================================================================
// Formats
// =============================================================================

/// Field format validators for string fields
#[derive(Debug, Clone)]
pub enum FieldFormat {
    Email,
    Uuid,
    Url,
    Phone,
    Custom(Regex),
}

impl FieldFormat {
    /// Parse a format name used in configuration
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "email" => Some(FieldFormat::Email),
            "uuid" => Some(FieldFormat::Uuid),
            "url" => Some(FieldFormat::Url),
            "phone" => Some(FieldFormat::Phone),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldFormat::Email => "email",
            FieldFormat::Uuid => "uuid",
            FieldFormat::Url => "url",
            FieldFormat::Phone => "phone",
            FieldFormat::Custom(regex) => regex.as_str(),
        }
    }

    /// Validate a string against this format
    pub fn validate(&self, value: &str) -> bool {
        match self {
            FieldFormat::Email => Self::is_valid_email(value),
            FieldFormat::Uuid => Uuid::parse_str(value).is_ok(),
            FieldFormat::Url => Self::is_valid_url(value),
            FieldFormat::Phone => Self::is_valid_phone(value),
            FieldFormat::Custom(regex) => regex.is_match(value),
        }
    }

    fn is_valid_email(email: &str) -> bool {
        static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = EMAIL_REGEX.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
        });
        regex.is_match(email)
    }

    fn is_valid_url(url: &str) -> bool {
        static URL_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = URL_REGEX.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());
        regex.is_match(url)
    }

    fn is_valid_phone(phone: &str) -> bool {
        static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
        // E.164: 8 to 15 digits
        let regex = PHONE_REGEX.get_or_init(|| Regex::new(r"^\+?[1-9]\d{7,14}$").unwrap());
        regex.is_match(phone)
    }
}
