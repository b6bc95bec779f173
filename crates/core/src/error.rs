//! Error types for the Arbor domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum.

use thiserror::Error;

/// The top-level error type for all Arbor operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Session tree errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Persistence collaborator errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool catalog collaborator errors ---
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means an unknown session or branch target.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Session(SessionError::NotFound(_))
                | Error::Session(SessionError::EntryNotFound(_))
                | Error::Store(StoreError::SessionNotFound(_))
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Boundary errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid session tree: {0}")]
    InvalidTree(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Session not found in store: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt session data for {session_id}: {reason}")]
    Corrupt { session_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Tool catalog unavailable: {0}")]
    Unavailable(String),
}
