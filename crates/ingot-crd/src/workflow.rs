//! Workflow resource types
//!
//! A Workflow is a materialized provisioning plan: an ordered list of tasks,
//! each pinned to one worker machine, each holding an ordered list of
//! container-image actions. The spec carries the template reference and the
//! device-label-to-MAC binding; the status carries the compiled plan and all
//! execution state.

use crate::{CrdError, ObjectMeta, Result, State, TypeMeta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workflow resource representing one provisioning job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, resourceVersion, etc.)
    pub metadata: ObjectMeta,

    /// Workflow specification
    pub spec: WorkflowSpec,

    /// Workflow status (populated by the reconciler on materialization)
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    /// Create a new Workflow referencing a template
    pub fn new(name: impl Into<String>, template_ref: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::workflow(),
            metadata: ObjectMeta::new(name),
            spec: WorkflowSpec {
                template_ref: template_ref.into(),
                hardware_map: HashMap::new(),
            },
            status: WorkflowStatus::default(),
        }
    }

    /// Add a device-label-to-worker binding
    pub fn with_hardware_map(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.hardware_map.insert(key.into(), value.into());
        self
    }

    /// Whether the reconciler has compiled the plan into the status yet
    pub fn is_materialized(&self) -> bool {
        self.status.state.is_some()
    }

    /// Whether the workflow reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.state.map(|s| s.is_terminal()).unwrap_or(false)
    }

    /// Whether the workflow is currently running
    pub fn is_running(&self) -> bool {
        self.status.state == Some(State::StateRunning)
    }

    /// Validate the workflow
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }
        if self.spec.template_ref.is_empty() {
            return Err(CrdError::MissingField("spec.templateRef".to_string()));
        }
        Ok(())
    }
}

/// Workflow specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// Name of the Template to compile
    pub template_ref: String,

    /// Device label to worker address mapping,
    /// e.g. {"device_1": "3c:ec:ef:4c:4f:54"}
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub hardware_map: HashMap<String, String>,
}

/// Workflow status
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// Current state; absent until the reconciler materializes the plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,

    /// Max execution time in seconds, counted from the first RUNNING
    /// transition
    #[serde(default)]
    pub global_timeout: i64,

    /// Compiled tasks, in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,

    /// Rendered template text, retained for audit
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,

    /// Time of the first RUNNING transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A group of actions pinned to one worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task name, unique within the workflow
    pub name: String,

    /// Worker address (MAC) resolved from the hardware map
    #[serde(rename = "worker")]
    pub worker_addr: String,

    /// Actions to execute in order
    pub actions: Vec<Action>,

    /// Task-scoped environment, the base for action merging
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Task-scoped volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

/// One container-image invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action name
    pub name: String,

    /// Container image to run
    pub image: String,

    /// Timeout in seconds
    #[serde(default)]
    pub timeout: i64,

    /// Command override
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// PID namespace mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,

    /// Merged environment (task scope overridden by action scope)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Merged volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Execution state
    #[serde(default)]
    pub status: State,

    /// Time the action entered RUNNING
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Elapsed seconds, recorded on the terminal transition
    #[serde(default)]
    pub seconds: i64,

    /// Outcome message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
