//! Template resource types
//!
//! A Template holds the declarative text of a provisioning plan. The text
//! is opaque at this level; the engine's renderer substitutes per-device
//! values and parses it into an ordered plan when a workflow referencing
//! the template is materialized.
//!
//! Templates are referenced by name, not by snapshot. Mutating a template
//! that is referenced by a non-terminal workflow changes what a re-render
//! would produce; callers are expected not to do that.

use crate::{CrdError, ObjectMeta, Result, TypeMeta};
use serde::{Deserialize, Serialize};

/// Template resource holding a provisioning plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, etc.)
    pub metadata: ObjectMeta,

    /// Template specification
    pub spec: TemplateSpec,
}

impl Template {
    /// Create a new Template with the given plan text
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::template(),
            metadata: ObjectMeta::new(name),
            spec: TemplateSpec {
                data: Some(data.into()),
            },
        }
    }

    /// Validate the template
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }
        if self.spec.data.as_deref().unwrap_or("").is_empty() {
            return Err(CrdError::MissingField("spec.data".to_string()));
        }
        Ok(())
    }
}

/// Template specification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// The plan text, interpreted by the renderer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}
