//! File-based session store: persistent JSON-lines storage.
//!
//! One file per session, `<session_id>.jsonl`, one `PersistedEntry` per line
//! in creation order. Human-inspectable and append-friendly.
//!
//! Storage location: `~/.arbor/sessions/` unless configured otherwise.

use std::path::{Path, PathBuf};

use arbor_core::error::StoreError;
use arbor_core::session::PersistedEntry;
use arbor_core::store::SessionStore;
use async_trait::async_trait;
use tracing::{debug, warn};

/// A directory of JSONL session files.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Storage(format!(
                "invalid session id for file storage: {session_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.jsonl")))
    }

    /// Parse JSONL content, skipping lines that fail to decode.
    fn parse_entries(session_id: &str, content: &str) -> Vec<PersistedEntry> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .filter_map(|(n, line)| match serde_json::from_str::<PersistedEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(session_id, line = n + 1, error = %e, "Skipping corrupted session entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_tree(&self, session_id: &str) -> Result<Vec<PersistedEntry>, StoreError> {
        let path = self.session_path(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::SessionNotFound(session_id.to_string()));
            }
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let entries = Self::parse_entries(session_id, &content);
        debug!(session_id, count = entries.len(), "Loaded session from disk");
        Ok(entries)
    }

    async fn save_tree(&self, session_id: &str, entries: &[PersistedEntry]) -> Result<(), StoreError> {
        let path = self.session_path(session_id)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize session entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write session file: {e}")))?;

        debug!(session_id, count = entries.len(), "Saved session to disk");
        Ok(())
    }

    async fn delete_tree(&self, session_id: &str) -> Result<bool, StoreError> {
        let path = self.session_path(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Storage(format!("Failed to delete session file: {e}"))),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Storage(format!("Failed to list sessions: {e}"))),
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to list sessions: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
