//! Ingot resource types
//!
//! This crate provides the resource model for bare metal provisioning:
//! `Hardware` (a physical machine), `Template` (a reusable plan), and
//! `Workflow` (a materialized plan bound to concrete machines). The types
//! follow the Kubernetes object convention (TypeMeta + ObjectMeta + spec +
//! status) so they can be persisted by resource-oriented backends unchanged.

pub mod error;
pub mod hardware;
pub mod metadata;
pub mod state;
pub mod template;
pub mod workflow;

pub use error::*;
pub use hardware::*;
pub use metadata::*;
pub use state::*;
pub use template::*;
pub use workflow::*;

/// API version for all Ingot resources
pub const API_VERSION: &str = "ingot.dev/v1alpha1";

/// API group for all Ingot resources
pub const API_GROUP: &str = "ingot.dev";
