pub mod config_cmd;
pub mod context;
pub mod session;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use arbor_agent::ContextEngine;
use arbor_config::AppConfig;
use arbor_core::store::SessionStore;
use arbor_core::tool::ToolCatalog;
use arbor_store::{FileSessionStore, InMemorySessionStore};
use arbor_tools::StaticToolCatalog;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The configured session store.
pub fn open_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    match config.storage.backend.as_str() {
        "memory" => {
            tracing::warn!("Memory backend selected: sessions will not outlive this process");
            Arc::new(InMemorySessionStore::new())
        }
        _ => Arc::new(FileSessionStore::new(config.storage.sessions_dir())),
    }
}

/// The built-in catalog, or one read from `path`.
pub fn open_catalog(path: Option<&Path>) -> Result<Arc<dyn ToolCatalog>, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(p) => Arc::new(StaticToolCatalog::from_json_file(p)?),
        None => Arc::new(arbor_tools::default_catalog()),
    })
}

pub fn build_engine(
    config: &AppConfig,
    catalog: Option<&Path>,
) -> Result<ContextEngine, Box<dyn std::error::Error>> {
    Ok(ContextEngine::from_config(
        config,
        open_store(config),
        open_catalog(catalog)?,
    ))
}
