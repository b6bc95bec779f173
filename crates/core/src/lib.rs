//! # Arbor Core
//!
//! Domain types, collaborator traits, and error definitions for the Arbor
//! conversation-context engine. This crate has **no framework dependencies**:
//! it defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (session persistence, tool catalog, id
//! generation) is a trait here. Implementations live in their own crates,
//! which keeps the engine testable with scripted stand-ins.

pub mod error;
pub mod id;
pub mod message;
pub mod session;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CatalogError, Error, Result, SessionError, StoreError};
pub use id::{IdGenerator, SequentialIds, UuidGenerator};
pub use message::{ContextMessage, MessageKind, Role};
pub use session::{MessageEntry, PersistedEntry, SessionHeader, SessionTree, TreeEntry};
pub use store::SessionStore;
pub use tool::{ToolCapability, ToolCatalog, ToolFunction};
