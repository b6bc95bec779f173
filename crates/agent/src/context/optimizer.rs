//! Conversation history compression.
//!
//! Fits the root → leaf history of a session into a token budget:
//!
//! 1. Hold back `reserved_tokens` for the system prompt and current query.
//! 2. Walk the history newest → oldest, keeping whole messages while they fit.
//! 3. At the first message that does not fit, stop. Everything from there back
//!    to the start is condensed into one synthetic summary record, which is
//!    kept only if it also fits.
//!
//! The output is chronological with the optional summary first. Its
//! estimated total never exceeds the budget, and compressing an output again
//! under the same budget returns it unchanged.

use std::sync::Arc;

use arbor_core::message::{ContextMessage, Role};
use arbor_core::session::SessionTree;
use tracing::debug;

use crate::context::token::{CharHeuristicEstimator, TokenEstimator};

pub const DEFAULT_RESERVED_TOKENS: usize = 1000;

/// Keyword → activity label, scanned when summarizing condensed turns.
const ACTIVITY_KEYWORDS: &[(&str, &str)] = &[
    ("executed", "code execution"),
    ("created", "code execution"),
    ("tool", "tool usage"),
];

/// Compresses message histories into a token budget.
#[derive(Clone)]
pub struct ConversationOptimizer {
    estimator: Arc<dyn TokenEstimator>,
    reserved_tokens: usize,
}

impl ConversationOptimizer {
    pub fn new(estimator: Arc<dyn TokenEstimator>, reserved_tokens: usize) -> Self {
        Self {
            estimator,
            reserved_tokens,
        }
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    pub fn reserved_tokens(&self) -> usize {
        self.reserved_tokens
    }

    /// Compress the tree's current root → leaf history into `max_tokens`.
    pub fn compress_history(&self, tree: &SessionTree, max_tokens: usize) -> Vec<ContextMessage> {
        self.compress_messages(&tree.history_messages(), max_tokens)
    }

    /// Compress a chronological message list into `max_tokens`.
    pub fn compress_messages(
        &self,
        messages: &[ContextMessage],
        max_tokens: usize,
    ) -> Vec<ContextMessage> {
        let available = max_tokens.saturating_sub(self.reserved_tokens);

        let mut selected = Vec::new();
        let mut used = 0;
        let mut overflow_at = None;
        for (i, msg) in messages.iter().enumerate().rev() {
            let cost = self.estimator.estimate_message(msg);
            if used + cost > available {
                overflow_at = Some(i);
                break;
            }
            used += cost;
            selected.push(msg.clone());
        }
        selected.reverse();

        if let Some(i) = overflow_at {
            let condensed = &messages[..=i];
            let summary = summarize(condensed);
            let cost = self.estimator.estimate_message(&summary);
            if used + cost <= available {
                debug!(
                    kept = selected.len(),
                    condensed = condensed.len(),
                    tokens = used + cost,
                    "History compressed with summary"
                );
                selected.insert(0, summary);
            } else {
                debug!(
                    kept = selected.len(),
                    dropped = condensed.len(),
                    available,
                    "Summary does not fit, older history omitted"
                );
            }
        }

        selected
    }
}

impl Default for ConversationOptimizer {
    fn default() -> Self {
        Self::new(
            Arc::new(CharHeuristicEstimator::default()),
            DEFAULT_RESERVED_TOKENS,
        )
    }
}

/// Build the synthetic summary record for condensed messages.
///
/// The id and timestamp derive from the newest condensed message so the
/// result is reproducible for the same history.
pub fn summarize(messages: &[ContextMessage]) -> ContextMessage {
    let user = messages.iter().filter(|m| m.role == Role::User).count();
    let assistant = messages.iter().filter(|m| m.role == Role::Assistant).count();

    let mut activities: Vec<&str> = Vec::new();
    for msg in messages {
        let content = msg.content.to_lowercase();
        for &(keyword, label) in ACTIVITY_KEYWORDS {
            if content.contains(keyword) && !activities.contains(&label) {
                activities.push(label);
            }
        }
    }

    let mut content = format!(
        "[Earlier conversation summary] {} messages condensed ({} from the user, {} from the assistant).",
        messages.len(),
        user,
        assistant
    );
    if !activities.is_empty() {
        content.push_str(&format!(" Activities: {}.", activities.join(", ")));
    }

    let mut summary = ContextMessage::summary(content);
    if let Some(last) = messages.last() {
        summary.id = format!("summary-{}", last.id);
        summary.timestamp = last.timestamp;
    }
    summary
}
