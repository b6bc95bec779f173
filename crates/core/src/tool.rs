//! Tool capabilities: the read-only view of the tool catalog.
//!
//! The sandboxed execution engine owns the actual tools. Context assembly
//! only needs to know what each tool is called, what it does, which
//! sub-functions it exposes, and which permissions it requires.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A named operation exposed by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ToolFunction {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A tool as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCapability {
    /// The unique name of this tool (e.g., "file_system").
    pub name: String,

    /// What this tool does (shown to the LLM).
    pub description: String,

    /// Sub-functions the tool exposes.
    #[serde(default)]
    pub functions: Vec<ToolFunction>,

    /// Permissions the tool requires (e.g., "fs:read").
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ToolCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            functions: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.functions.push(ToolFunction::new(name, description));
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }
}

/// The tool catalog collaborator.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Every tool, in catalog order.
    async fn all_tools(&self) -> Result<Vec<ToolCapability>, CatalogError>;
}
