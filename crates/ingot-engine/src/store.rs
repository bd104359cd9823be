//! Persistence seam
//!
//! The engine knows a single `Store` capability surface; backends
//! (in-memory, relational, resource-oriented) implement it. Workflow status
//! has exactly one write path, `patch_workflow_status`, which applies the
//! caller's status only when the persisted version token still matches the
//! caller's base copy. Losers of a patch race get `Conflict` and retry from
//! a fresh load.

use async_trait::async_trait;
use ingot_crd::{Hardware, Template, Workflow};
use thiserror::Error;
use uuid::Uuid;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Version precondition failed on a conditional patch
    #[error("conflict: {0}")]
    Conflict(String),

    /// A single-value lookup matched more than one resource. The
    /// conflicting names are reported, never silently resolved.
    #[error("ambiguous {kind} lookup '{key}': matches {names:?}")]
    Ambiguous {
        kind: &'static str,
        key: String,
        names: Vec<String>,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage backend for workflows, hardware, and templates.
///
/// Object-safe so services can share an `Arc<dyn Store>`.
#[async_trait]
pub trait Store: Send + Sync {
    // === Workflow operations ===

    /// Fetch one workflow by name
    async fn get_workflow(&self, name: &str) -> Result<Workflow>;

    /// List all workflows
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;

    /// List workflows that have some task pinned to the given worker
    /// address. Must be linearizable with status writes: a task whose
    /// worker was just persisted is visible to the next call.
    async fn list_workflows_for_worker(&self, worker_addr: &str) -> Result<Vec<Workflow>>;

    /// Create a workflow
    async fn create_workflow(&self, wf: &Workflow) -> Result<()>;

    /// Replace the persisted status of `base`'s workflow with `new`'s
    /// status, only if the stored version token still equals `base`'s.
    /// This is the sole write path for workflow status.
    async fn patch_workflow_status(&self, new: &Workflow, base: &Workflow) -> Result<()>;

    /// Delete a workflow by name
    async fn delete_workflow(&self, name: &str) -> Result<()>;

    // === Template operations ===

    /// Fetch a template by name
    async fn get_template(&self, name: &str) -> Result<Template>;

    /// Store or update a template
    async fn put_template(&self, template: &Template) -> Result<()>;

    // === Hardware operations ===

    /// Look up hardware by interface MAC address
    async fn get_hardware_by_mac(&self, mac: &str) -> Result<Hardware>;

    /// Look up hardware by interface IP address
    async fn get_hardware_by_ip(&self, ip: &str) -> Result<Hardware>;

    /// Look up hardware by uid
    async fn get_hardware_by_id(&self, id: &Uuid) -> Result<Hardware>;

    /// Store or update hardware
    async fn put_hardware(&self, hw: &Hardware) -> Result<()>;
}
