//! Contabo Provider
//!
//! Manages Contabo compute instances, custom images, snapshots, object
//! storages and their buckets, secrets, private networks and tags through
//! the Contabo REST API.

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod poll;
pub mod provider;
pub mod reconciler;
pub mod resources;
pub mod s3;
pub mod state;

pub use config::ProviderConfig;
pub use context::ProviderContext;
pub use provider::{ContaboProvider, Diagnostic, ResourceResponse, Severity};
