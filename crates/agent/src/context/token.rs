//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, plus a fixed
//! per-message framing overhead that is higher for system messages. The
//! estimate is deterministic, which keeps compression reproducible.
//! Swap in another [`TokenEstimator`] for a real tokenizer.

use arbor_config::TokenConfig;
use arbor_core::message::{ContextMessage, Role};

/// Estimates token cost of text and messages.
pub trait TokenEstimator: Send + Sync {
    /// Tokens for raw text.
    fn estimate_text(&self, text: &str) -> usize;

    /// Framing cost added to every message of `role`.
    fn message_overhead(&self, role: Role) -> usize;

    fn estimate_message(&self, message: &ContextMessage) -> usize {
        self.estimate_text(&message.content) + self.message_overhead(message.role)
    }

    fn estimate_messages(&self, messages: &[ContextMessage]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

/// `ceil(chars / chars_per_token)` plus role overhead.
#[derive(Debug, Clone)]
pub struct CharHeuristicEstimator {
    chars_per_token: usize,
    message_overhead: usize,
    system_overhead: usize,
}

impl CharHeuristicEstimator {
    pub fn new(chars_per_token: usize, message_overhead: usize, system_overhead: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            message_overhead,
            system_overhead,
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(
            config.chars_per_token,
            config.message_overhead,
            config.system_overhead,
        )
    }
}

impl Default for CharHeuristicEstimator {
    fn default() -> Self {
        Self::from_config(&TokenConfig::default())
    }
}

impl TokenEstimator for CharHeuristicEstimator {
    fn estimate_text(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn message_overhead(&self, role: Role) -> usize {
        match role {
            Role::System => self.system_overhead,
            Role::User | Role::Assistant => self.message_overhead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(CharHeuristicEstimator::default().estimate_text(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(CharHeuristicEstimator::default().estimate_text("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(CharHeuristicEstimator::default().estimate_text("hello"), 2);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 4 characters, 8 bytes
        assert_eq!(CharHeuristicEstimator::default().estimate_text("ñañá"), 1);
    }

    #[test]
    fn message_includes_role_overhead() {
        let est = CharHeuristicEstimator::default();
        assert_eq!(est.estimate_message(&ContextMessage::user("test")), 11);
        assert_eq!(est.estimate_message(&ContextMessage::assistant("test")), 11);
        assert_eq!(est.estimate_message(&ContextMessage::system("test")), 21);
    }

    #[test]
    fn four_hundred_chars_is_110_tokens() {
        let est = CharHeuristicEstimator::default();
        let msg = ContextMessage::user("x".repeat(400));
        assert_eq!(est.estimate_message(&msg), 110);
    }

    #[test]
    fn multiple_messages() {
        let est = CharHeuristicEstimator::default();
        let msgs = vec![
            ContextMessage::user("hello"),      // 2 + 10
            ContextMessage::assistant("world"), // 2 + 10
        ];
        assert_eq!(est.estimate_messages(&msgs), 24);
    }

    #[test]
    fn custom_ratio() {
        let est = CharHeuristicEstimator::new(2, 0, 0);
        assert_eq!(est.estimate_text("abcde"), 3);
    }
}
