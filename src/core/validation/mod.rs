//! Constraint checks shared by the field layer
//!
//! Each validator is a small closure built from a declared constraint and
//! applied to an already-coerced [`FieldValue`](crate::core::field::FieldValue).

pub mod validators;

pub use validators::Check;
