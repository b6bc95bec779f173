//! Message value objects that flow through context assembly.
//!
//! Tree entries become `ContextMessage`s when history is walked; the
//! optimizer may add synthetic summary records, and the prompt builder adds
//! the system and query messages around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions and synthetic summaries
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Distinguishes raw conversation turns from records synthesized during compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Message,
    Summary,
}

/// A single message in an assembled context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Message ID. Equal to the tree entry id for history messages.
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// `summary` for synthetic compression records
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
}

impl ContextMessage {
    /// Create a message with a fresh id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            kind: MessageKind::Message,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a synthetic summary record (always `Role::System`).
    pub fn summary(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Summary,
            ..Self::new(Role::System, content)
        }
    }

    pub fn is_summary(&self) -> bool {
        self.kind == MessageKind::Summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_system_role() {
        let msg = ContextMessage::summary("earlier turns");
        assert_eq!(msg.role, Role::System);
        assert!(msg.is_summary());
        assert!(!ContextMessage::system("rules").is_summary());
    }

    #[test]
    fn summary_tag_serializes_as_type() {
        let json = serde_json::to_value(ContextMessage::summary("s")).unwrap();
        assert_eq!(json["type"], "summary");
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("tool".parse::<Role>().is_err());
    }
}
