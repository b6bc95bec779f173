//! Session persistence collaborator.
//!
//! The engine keeps session trees in a process-local cache and writes through
//! to a `SessionStore`. Implementations: in-memory (tests) and JSON-lines
//! files, both in `arbor-store`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::PersistedEntry;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Load a session's entries in creation order.
    ///
    /// Returns `StoreError::SessionNotFound` for an unknown id.
    async fn load_tree(&self, session_id: &str) -> Result<Vec<PersistedEntry>, StoreError>;

    /// Replace a session's entries.
    async fn save_tree(&self, session_id: &str, entries: &[PersistedEntry]) -> Result<(), StoreError>;

    /// Delete a session. Returns whether it existed.
    async fn delete_tree(&self, session_id: &str) -> Result<bool, StoreError>;

    /// All stored session ids, sorted.
    async fn list_sessions(&self) -> Result<Vec<String>, StoreError>;
}
