//! API exposure modules
//!
//! Each exposure consumes a set-up registry and produces a router.

pub mod rest;

pub use rest::RestExposure;
