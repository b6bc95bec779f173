//! Session trees: branching conversation history.
//!
//! A session is a tree rooted at a single [`SessionHeader`]. Every
//! [`MessageEntry`] points at its parent by id. The tree keeps a *leaf*
//! pointer: appending parents the new entry at the leaf and advances it,
//! while [`SessionTree::branch`] repoints the leaf at any existing entry so the
//! next append starts an alternate continuation.
//!
//! Entries live in an arena (`Vec`) in creation order with an id → index
//! map. Parent links are ids, never references, so loaded data with dangling
//! or cyclic links cannot break the walk.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SessionError;
use crate::id::{IdGenerator, UuidGenerator};
use crate::message::{ContextMessage, MessageKind, Role};

/// Root of a session tree. Exactly one per tree, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub working_directory: String,
}

/// A conversation turn. Created once, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub id: String,
    pub parent_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Any node in a session tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "lowercase")]
pub enum TreeEntry {
    Header(SessionHeader),
    Message(MessageEntry),
}

impl TreeEntry {
    pub fn id(&self) -> &str {
        match self {
            TreeEntry::Header(h) => &h.id,
            TreeEntry::Message(m) => &m.id,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            TreeEntry::Header(_) => None,
            TreeEntry::Message(m) => Some(&m.parent_id),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            TreeEntry::Header(h) => h.created_at,
            TreeEntry::Message(m) => m.created_at,
        }
    }

    pub fn as_message(&self) -> Option<&MessageEntry> {
        match self {
            TreeEntry::Message(m) => Some(m),
            TreeEntry::Header(_) => None,
        }
    }
}

impl From<&MessageEntry> for ContextMessage {
    fn from(entry: &MessageEntry) -> Self {
        ContextMessage {
            id: entry.id.clone(),
            role: entry.role,
            content: entry.content.clone(),
            timestamp: entry.created_at,
            kind: MessageKind::Message,
        }
    }
}

/// The entry shape exchanged with the persistence collaborator.
///
/// Absent `role`/`content` marks the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub id: String,
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl PersistedEntry {
    pub fn is_header(&self) -> bool {
        self.role.is_none() && self.content.is_none()
    }
}

impl From<&TreeEntry> for PersistedEntry {
    fn from(entry: &TreeEntry) -> Self {
        match entry {
            TreeEntry::Header(h) => PersistedEntry {
                id: h.id.clone(),
                parent_id: None,
                role: None,
                content: None,
                created_at: h.created_at.timestamp_millis(),
                working_directory: Some(h.working_directory.clone()),
            },
            TreeEntry::Message(m) => PersistedEntry {
                id: m.id.clone(),
                parent_id: Some(m.parent_id.clone()),
                role: Some(m.role),
                content: Some(m.content.clone()),
                created_at: m.created_at.timestamp_millis(),
                working_directory: None,
            },
        }
    }
}

/// In-memory tree of conversation entries with a movable leaf pointer.
///
/// Single writer per instance: mutation takes `&mut self`.
#[derive(Clone)]
pub struct SessionTree {
    entries: Vec<TreeEntry>,
    index: HashMap<String, usize>,
    root_id: String,
    leaf_id: String,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for SessionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTree")
            .field("root_id", &self.root_id)
            .field("leaf_id", &self.leaf_id)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Current time truncated to the millisecond precision the store keeps.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

impl SessionTree {
    /// Create a tree holding only a header; the leaf is the header.
    pub fn new(working_directory: impl Into<String>) -> Self {
        Self::with_ids(working_directory, Arc::new(UuidGenerator))
    }

    /// Create a tree whose entry ids come from `ids`.
    pub fn with_ids(working_directory: impl Into<String>, ids: Arc<dyn IdGenerator>) -> Self {
        let header = SessionHeader {
            id: ids.next_id(),
            created_at: now_millis(),
            working_directory: working_directory.into(),
        };
        let root_id = header.id.clone();
        let mut index = HashMap::new();
        index.insert(root_id.clone(), 0);
        Self {
            entries: vec![TreeEntry::Header(header)],
            index,
            leaf_id: root_id.clone(),
            root_id,
            ids,
        }
    }

    /// Rebuild a tree from the persistence collaborator's ordered entry set.
    ///
    /// The leaf of a loaded tree is the last entry in the set. Dangling
    /// parent links are kept; [`SessionTree::history`] stops at them.
    pub fn from_persisted(
        persisted: Vec<PersistedEntry>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, SessionError> {
        let mut entries = Vec::with_capacity(persisted.len());
        let mut index = HashMap::with_capacity(persisted.len());
        let mut root_id: Option<String> = None;

        for p in persisted {
            let created_at = DateTime::from_timestamp_millis(p.created_at).ok_or_else(|| {
                SessionError::InvalidTree(format!("entry {} has invalid createdAt", p.id))
            })?;
            if index.contains_key(&p.id) {
                return Err(SessionError::InvalidTree(format!("duplicate entry id {}", p.id)));
            }

            let entry = if p.is_header() {
                if root_id.is_some() {
                    return Err(SessionError::InvalidTree("more than one header".into()));
                }
                if p.parent_id.is_some() {
                    return Err(SessionError::InvalidTree("header has a parent".into()));
                }
                root_id = Some(p.id.clone());
                TreeEntry::Header(SessionHeader {
                    id: p.id,
                    created_at,
                    working_directory: p.working_directory.unwrap_or_default(),
                })
            } else {
                let (Some(parent_id), Some(role)) = (p.parent_id, p.role) else {
                    return Err(SessionError::InvalidTree(format!(
                        "message {} lacks a parent or role",
                        p.id
                    )));
                };
                TreeEntry::Message(MessageEntry {
                    id: p.id,
                    parent_id,
                    role,
                    content: p.content.unwrap_or_default(),
                    created_at,
                })
            };
            index.insert(entry.id().to_string(), entries.len());
            entries.push(entry);
        }

        let root_id = root_id.ok_or_else(|| SessionError::InvalidTree("no header".into()))?;
        // A header exists, so `entries` is non-empty.
        let leaf_id = entries
            .last()
            .map(|e| e.id().to_string())
            .unwrap_or_else(|| root_id.clone());

        Ok(Self {
            entries,
            index,
            root_id,
            leaf_id,
            ids,
        })
    }

    /// Export every entry, in creation order, in the persisted shape.
    pub fn to_persisted(&self) -> Vec<PersistedEntry> {
        self.entries.iter().map(PersistedEntry::from).collect()
    }

    // ── Mutation ──

    /// Append a message parented at the current leaf and advance the leaf to it.
    pub fn append_message(&mut self, role: Role, content: impl Into<String>) -> String {
        let entry = MessageEntry {
            id: self.ids.next_id(),
            parent_id: self.leaf_id.clone(),
            role,
            content: content.into(),
            created_at: now_millis(),
        };
        let id = entry.id.clone();
        debug!(entry_id = %id, parent_id = %entry.parent_id, role = %role, "Appended message");
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(TreeEntry::Message(entry));
        self.leaf_id = id.clone();
        id
    }

    /// Repoint the leaf at an existing entry. Creates nothing.
    pub fn branch(&mut self, entry_id: &str) -> Result<(), SessionError> {
        if !self.index.contains_key(entry_id) {
            return Err(SessionError::EntryNotFound(entry_id.to_string()));
        }
        debug!(from = %self.leaf_id, to = %entry_id, "Branched session tree");
        self.leaf_id = entry_id.to_string();
        Ok(())
    }

    // ── Traversal ──

    /// Entries on the path root → leaf, in chronological order.
    ///
    /// If a parent link is missing, returns the reachable part of the path.
    pub fn history(&self) -> Vec<&TreeEntry> {
        let mut path = Vec::new();
        let mut cursor = self.get_entry(&self.leaf_id);
        while let Some(entry) = cursor {
            path.push(entry);
            // A cycle in loaded data would otherwise never terminate.
            if path.len() > self.entries.len() {
                break;
            }
            cursor = entry.parent_id().and_then(|p| self.get_entry(p));
        }
        path.reverse();
        path
    }

    /// The message entries of [`SessionTree::history`] as context messages.
    pub fn history_messages(&self) -> Vec<ContextMessage> {
        self.history()
            .into_iter()
            .filter_map(TreeEntry::as_message)
            .map(ContextMessage::from)
            .collect()
    }

    // ── Lookups ──

    /// All entries in creation order, across every branch.
    pub fn tree(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn get_entry(&self, id: &str) -> Option<&TreeEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn has_entry(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Direct children of `id`, in creation order.
    pub fn children(&self, id: &str) -> Vec<&TreeEntry> {
        self.entries
            .iter()
            .filter(|e| e.parent_id() == Some(id))
            .collect()
    }

    pub fn header(&self) -> Option<&SessionHeader> {
        match self.get_entry(&self.root_id) {
            Some(TreeEntry::Header(h)) => Some(h),
            _ => None,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn leaf_id(&self) -> &str {
        &self.leaf_id
    }

    /// Number of entries including the header.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
