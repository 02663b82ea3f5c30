//! Link management module
//!
//! Setup-time reconciliation of link declarations, and the runtime handles
//! through which callers read and mutate relations.

mod collection;
pub mod handlers;
mod holder;
mod instance;
pub mod registry;
pub mod service;
mod to_one;

pub use collection::{LinkCollection, RootLinkCollection};
pub use holder::{LinkHandle, LinkHolder};
pub use instance::LinkInstance;
pub use registry::{LinkId, LinkNode, ResourceNode, Topology, Wiring};
pub use service::{LinkService, PendingLink, TARGET_KEY};
pub use to_one::LinkToOne;
