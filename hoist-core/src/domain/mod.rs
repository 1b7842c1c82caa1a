//! Domain types
//!
//! Values resolved once from configuration and treated as read-only for the
//! rest of a deploy run.

pub mod environment;
pub mod release;
pub mod target;

pub use environment::Environment;
pub use release::{ReleaseId, ReleaseIdError};
pub use target::Target;
