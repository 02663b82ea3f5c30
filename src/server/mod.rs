//! Server module: the registry, per-caller entry points and the HTTP surface
//!
//! - [`Registry`] collects declarations and reconciles them at setup
//! - [`EntryPoint`] is the caller-bound root of every runtime handle
//! - [`GraphBuilder`] wires a registry to the REST exposure and serves it

pub mod builder;
pub mod entry_point;
pub mod exposure;
pub mod registry;
pub mod router;

pub use builder::GraphBuilder;
pub use entry_point::EntryPoint;
pub use registry::{Naming, Registry};
