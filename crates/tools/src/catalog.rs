//! In-process tool catalog.

use std::path::Path;
use std::sync::Arc;

use arbor_core::error::CatalogError;
use arbor_core::tool::{ToolCapability, ToolCatalog};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// A catalog holding capabilities in registration order.
///
/// Cloning shares the underlying list, so the orchestration layer can keep a
/// handle for registration while the engine reads through another.
#[derive(Clone, Default)]
pub struct StaticToolCatalog {
    tools: Arc<RwLock<Vec<ToolCapability>>>,
}

impl StaticToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: Vec<ToolCapability>) -> Self {
        Self {
            tools: Arc::new(RwLock::new(tools)),
        }
    }

    /// Load capabilities from a JSON array file.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let tools: Vec<ToolCapability> = serde_json::from_str(&content).map_err(|e| {
            CatalogError::Unavailable(format!("Invalid tool catalog {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), count = tools.len(), "Loaded tool catalog");
        Ok(Self::from_tools(tools))
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub async fn register(&self, tool: ToolCapability) {
        let mut tools = self.tools.write().await;
        match tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => *existing = tool,
            None => tools.push(tool),
        }
    }

    /// Remove a tool by name. Returns whether it was present.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut tools = self.tools.write().await;
        let before = tools.len();
        tools.retain(|t| t.name != name);
        tools.len() < before
    }

    pub async fn names(&self) -> Vec<String> {
        self.tools.read().await.iter().map(|t| t.name.clone()).collect()
    }
}

#[async_trait]
impl ToolCatalog for StaticToolCatalog {
    async fn all_tools(&self) -> Result<Vec<ToolCapability>, CatalogError> {
        Ok(self.tools.read().await.clone())
    }
}
