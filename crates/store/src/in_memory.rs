//! In-memory backend: useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_core::error::StoreError;
use arbor_core::session::PersistedEntry;
use arbor_core::store::SessionStore;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Stores each session's entries in a map keyed by session id.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<PersistedEntry>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_tree(&self, session_id: &str) -> Result<Vec<PersistedEntry>, StoreError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }

    async fn save_tree(&self, session_id: &str, entries: &[PersistedEntry]) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), entries.to_vec());
        Ok(())
    }

    async fn delete_tree(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
