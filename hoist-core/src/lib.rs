//! Hoist Core
//!
//! Core types and abstractions for the hoist deployment tool.
//!
//! This crate contains:
//! - Domain types: the deploy target, the selected environment, release identifiers
//! - Configuration: the `hoist.json` file layout, lookup and validation

pub mod config;
pub mod domain;

/// Version of hoist that configuration files must declare
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
