//! Rolling per-session context windows.
//!
//! A [`ContextWindow`] is the buffer of messages currently in scope for a
//! session's next model call. Messages are appended turn by turn with an
//! incrementally maintained token count; when the count passes the limit the
//! window is re-derived with the same newest-first, summarize-the-rest
//! strategy used for history compression. Idle windows are evicted by
//! [`ContextManager::cleanup_old_contexts`].
//!
//! The manager is a plain owned store: mutation takes `&mut self`, so callers
//! serialize per-session updates through ownership.

use std::collections::{HashMap, HashSet};

use arbor_core::message::ContextMessage;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::optimizer::ConversationOptimizer;

pub const DEFAULT_MAX_AGE_MS: u64 = 3_600_000;

/// One session's in-scope messages.
#[derive(Debug, Clone, Serialize)]
pub struct ContextWindow {
    pub messages: Vec<ContextMessage>,
    pub token_count: usize,
    pub last_updated: DateTime<Utc>,
    /// Every message id ever appended, including ones since condensed.
    /// Grows with the session's history and lives exactly as long as the
    /// window: `clear_context` and idle eviction drop it.
    #[serde(skip)]
    recorded: HashSet<String>,
}

impl ContextWindow {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            token_count: 0,
            last_updated: now,
            recorded: HashSet::new(),
        }
    }
}

/// Summary statistics for a session's window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStats {
    pub message_count: usize,
    pub token_count: usize,
    pub average_tokens_per_message: f64,
    /// `None` when the session has no window.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Owns every session's [`ContextWindow`].
#[derive(Clone, Default)]
pub struct ContextManager {
    windows: HashMap<String, ContextWindow>,
    optimizer: ConversationOptimizer,
}

impl ContextManager {
    pub fn new(optimizer: ConversationOptimizer) -> Self {
        Self {
            windows: HashMap::new(),
            optimizer,
        }
    }

    /// Append `new_messages` to the session's window, creating it if needed,
    /// and compress the window if its token count now exceeds `max_tokens`.
    pub fn update_context_window(
        &mut self,
        session_id: &str,
        new_messages: Vec<ContextMessage>,
        max_tokens: usize,
    ) {
        self.update_at(session_id, new_messages, max_tokens, Utc::now());
    }

    fn update_at(
        &mut self,
        session_id: &str,
        new_messages: Vec<ContextMessage>,
        max_tokens: usize,
        now: DateTime<Utc>,
    ) {
        let estimator = self.optimizer.estimator().clone();
        let window = self
            .windows
            .entry(session_id.to_string())
            .or_insert_with(|| ContextWindow::new(now));

        let added = new_messages.len();
        for msg in new_messages {
            window.token_count += estimator.estimate_message(&msg);
            window.recorded.insert(msg.id.clone());
            window.messages.push(msg);
        }
        window.last_updated = now;
        debug!(session_id, added, tokens = window.token_count, "Context window updated");

        if window.token_count > max_tokens {
            info!(
                session_id,
                tokens = window.token_count,
                max_tokens,
                "Context window over limit, optimizing"
            );
            self.optimize_at(session_id, max_tokens, now);
        }
    }

    /// Re-derive the session's window to fit `max_tokens`. Returns `false` for
    /// an unknown session.
    pub fn optimize_context_window(&mut self, session_id: &str, max_tokens: usize) -> bool {
        self.optimize_at(session_id, max_tokens, Utc::now())
    }

    fn optimize_at(&mut self, session_id: &str, max_tokens: usize, now: DateTime<Utc>) -> bool {
        let Some(window) = self.windows.get_mut(session_id) else {
            return false;
        };
        let before = window.messages.len();
        window.messages = self.optimizer.compress_messages(&window.messages, max_tokens);
        window.token_count = self.optimizer.estimator().estimate_messages(&window.messages);
        window.last_updated = now;
        debug!(
            session_id,
            before,
            after = window.messages.len(),
            tokens = window.token_count,
            "Context window optimized"
        );
        true
    }

    /// Whether the session's window is over `max_tokens`.
    pub fn needs_optimization(&self, session_id: &str, max_tokens: usize) -> bool {
        self.windows
            .get(session_id)
            .is_some_and(|w| w.token_count > max_tokens)
    }

    pub fn get_context_stats(&self, session_id: &str) -> ContextStats {
        match self.windows.get(session_id) {
            Some(w) => ContextStats {
                message_count: w.messages.len(),
                token_count: w.token_count,
                average_tokens_per_message: if w.messages.is_empty() {
                    0.0
                } else {
                    w.token_count as f64 / w.messages.len() as f64
                },
                last_updated: Some(w.last_updated),
            },
            None => ContextStats {
                message_count: 0,
                token_count: 0,
                average_tokens_per_message: 0.0,
                last_updated: None,
            },
        }
    }

    pub fn get_window(&self, session_id: &str) -> Option<&ContextWindow> {
        self.windows.get(session_id)
    }

    /// The session's in-scope messages; empty for an unknown session.
    pub fn get_current_context(&self, session_id: &str) -> Vec<ContextMessage> {
        self.windows
            .get(session_id)
            .map(|w| w.messages.clone())
            .unwrap_or_default()
    }

    /// Whether a message id was ever appended to the session's window.
    pub fn has_recorded(&self, session_id: &str, message_id: &str) -> bool {
        self.windows
            .get(session_id)
            .is_some_and(|w| w.recorded.contains(message_id))
    }

    /// Drop the session's window. Returns whether one existed.
    pub fn clear_context(&mut self, session_id: &str) -> bool {
        self.windows.remove(session_id).is_some()
    }

    /// Session ids with a live window, sorted.
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.windows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove windows not updated within `max_age_ms`; returns how many.
    pub fn cleanup_old_contexts(&mut self, max_age_ms: u64) -> usize {
        self.evict_idle(max_age_ms).len()
    }

    /// Like [`cleanup_old_contexts`](Self::cleanup_old_contexts), but returns
    /// the evicted session ids, sorted.
    pub fn evict_idle(&mut self, max_age_ms: u64) -> Vec<String> {
        self.cleanup_at(max_age_ms, Utc::now())
    }

    fn cleanup_at(&mut self, max_age_ms: u64, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = i64::try_from(max_age_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|age| now.checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return Vec::new();
        };

        let mut evicted: Vec<String> = self
            .windows
            .iter()
            .filter(|(_, w)| w.last_updated <= cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        evicted.sort();
        for id in &evicted {
            self.windows.remove(id);
        }
        if !evicted.is_empty() {
            info!(removed = evicted.len(), max_age_ms, "Evicted idle context windows");
        }
        evicted
    }
}
