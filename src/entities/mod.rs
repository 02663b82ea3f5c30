//! Runtime resource handles
//!
//! Root collections, filtered collections and instances. None of them cache
//! data; authorization and reads are re-derived on every call.

mod collection;
pub mod handlers;
mod instance;
pub mod macros;

pub use collection::{ResourceCollection, RootResourceCollection};
pub use instance::ResourceInstance;

use crate::core::field::Key;
use std::collections::HashSet;

/// Instances already handled by a cascading delete, as (resource, key)
pub(crate) type Visited = HashSet<(String, Key)>;
