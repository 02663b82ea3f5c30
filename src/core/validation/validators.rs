//! Reusable field validators
//!
//! These validators are composed by [`Field`](crate::core::schema::Field) from
//! its declared constraints. They run on coerced values, after type checking.

use crate::core::field::{FieldFormat, FieldValue};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;

/// A boxed constraint check
pub type Check = Arc<dyn Fn(&FieldValue) -> Result<(), String> + Send + Sync>;

/// Validator: value must not be below `min`
pub fn min_value(min: FieldValue) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| match value.compare(&min) {
        Some(Ordering::Less) => Err("Value is too small".to_string()),
        _ => Ok(()),
    }
}

/// Validator: value must not exceed `max`
pub fn max_value(max: FieldValue) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| match value.compare(&max) {
        Some(Ordering::Greater) => Err("Value is too big".to_string()),
        _ => Ok(()),
    }
}

/// Validator: string length (in characters) must be within range
pub fn string_length(
    min: Option<usize>,
    max: Option<usize>,
) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| {
        let Some(s) = value.as_string() else {
            return Ok(());
        };
        let len = s.chars().count();
        if min.is_some_and(|min| len < min) {
            Err("Length is too small".to_string())
        } else if max.is_some_and(|max| len > max) {
            Err("Length is too big".to_string())
        } else {
            Ok(())
        }
    }
}

/// Validator: string must match `pattern` starting at its first character
pub fn pattern(regex: Regex) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| {
        let Some(s) = value.as_string() else {
            return Ok(());
        };
        match regex.find(s) {
            Some(m) if m.start() == 0 => Ok(()),
            _ => Err("Value does not match the pattern".to_string()),
        }
    }
}

/// Validator: string must satisfy a well-known format
pub fn format(format: FieldFormat) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| match value.as_string() {
        Some(s) if !format.validate(s) => Err(format!("Value is not a valid {}", format.name())),
        _ => Ok(()),
    }
}

/// Validator: value must be in allowed list
pub fn in_list(allowed: Vec<FieldValue>) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| {
        if allowed.contains(value) {
            Ok(())
        } else {
            Err("Value is not in choices".to_string())
        }
    }
}

/// Validator: value must not be in the excluded list
pub fn not_in_list(
    excluded: Vec<FieldValue>,
) -> impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |value: &FieldValue| {
        if excluded.contains(value) {
            Err("Value is in invalid choices".to_string())
        } else {
            Ok(())
        }
    }
}

/// Run every check, returning the first failure
pub fn run_all(checks: &[Check], value: &FieldValue) -> Result<(), String> {
    checks.iter().try_for_each(|check| check(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_value_rejects_smaller() {
        let v = min_value(FieldValue::Integer(3));
        assert_eq!(v(&FieldValue::Integer(2)), Err("Value is too small".to_string()));
        assert!(v(&FieldValue::Integer(3)).is_ok());
    }

    #[test]
    fn test_max_value_compares_floats_with_integers() {
        let v = max_value(FieldValue::Integer(10));
        assert!(v(&FieldValue::Float(10.5)).is_err());
        assert!(v(&FieldValue::Float(9.9)).is_ok());
    }

    #[test]
    fn test_string_length_counts_characters() {
        let v = string_length(Some(2), Some(3));
        assert!(v(&FieldValue::from("été")).is_ok());
        assert_eq!(v(&FieldValue::from("a")), Err("Length is too small".to_string()));
        assert_eq!(v(&FieldValue::from("abcd")), Err("Length is too big".to_string()));
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let v = pattern(Regex::new(r"\d+").unwrap());
        assert!(v(&FieldValue::from("123abc")).is_ok());
        assert!(v(&FieldValue::from("abc123")).is_err());
    }

    #[test]
    fn test_choices() {
        let v = in_list(vec![FieldValue::from("a"), FieldValue::from("b")]);
        assert!(v(&FieldValue::from("a")).is_ok());
        assert!(v(&FieldValue::from("c")).is_err());

        let v = not_in_list(vec![FieldValue::Integer(0)]);
        assert!(v(&FieldValue::Integer(0)).is_err());
        assert!(v(&FieldValue::Integer(1)).is_ok());
    }

    #[test]
    fn test_format_validator() {
        let v = format(FieldFormat::Email);
        assert!(v(&FieldValue::from("a@b.io")).is_ok());
        assert_eq!(
            v(&FieldValue::from("nope")),
            Err("Value is not a valid email".to_string())
        );
    }

    #[test]
    fn test_run_all_stops_at_first_failure() {
        let checks: Vec<Check> = vec![
            Arc::new(min_value(FieldValue::Integer(0))),
            Arc::new(max_value(FieldValue::Integer(5))),
        ];
        assert!(run_all(&checks, &FieldValue::Integer(3)).is_ok());
        assert_eq!(
            run_all(&checks, &FieldValue::Integer(9)),
            Err("Value is too big".to_string())
        );
    }
}
