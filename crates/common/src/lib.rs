//! Contabo Provider Common Library
//!
//! Shared wire models, lifecycle statuses, composite identifiers and the
//! error taxonomy used by the provider.

pub mod error;
pub mod ids;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use ids::{BucketId, TagAssignmentId};
pub use status::{ImageStatus, InstanceStatus, Phase};
pub use types::*;

/// Provider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trace identifier attached to every control-plane request
pub const TRACE_ID: &str = "contabo_terraform_provider";
