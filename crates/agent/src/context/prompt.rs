//! Prompt assembly and token accounting.
//!
//! A prompt is always three parts: one system message describing the
//! relevant tools, the compressed history, and the current user query.
//! [`PromptBuilder::optimize_prompt`] is the single backpressure step: when a
//! prompt overflows its limit, history is recompressed once at
//! `safety_margin × limit` while the system and query messages stay verbatim.

use std::sync::Arc;

use arbor_core::message::ContextMessage;
use arbor_core::session::SessionTree;
use serde::Serialize;
use tracing::info;

use crate::context::optimizer::ConversationOptimizer;
use crate::context::token::TokenEstimator;
use crate::context::tool_analyzer::RankedTool;

pub const DEFAULT_TOKEN_LIMIT: usize = 8000;
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.8;

const ASSISTANT_PREAMBLE: &str = "You are an AI coding assistant working inside the user's project.";
const NO_TOOLS_LINE: &str =
    "You can execute code to inspect the project and verify your answers.";

/// Token accounting for an assembled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenUsage {
    pub current: usize,
    pub limit: usize,
    /// `limit - current`, floored at zero.
    pub remaining: usize,
    /// `current / limit` as a percentage.
    pub utilization: f64,
}

impl TokenUsage {
    pub fn new(current: usize, limit: usize) -> Self {
        let utilization = if limit == 0 {
            0.0
        } else {
            current as f64 / limit as f64 * 100.0
        };
        Self {
            current,
            limit,
            remaining: limit.saturating_sub(current),
            utilization,
        }
    }

    pub fn fits(&self) -> bool {
        self.current <= self.limit
    }
}

/// The assembled prompt, ready for the LLM transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    /// `[system, ...optimized_history, user query]`
    pub messages: Vec<ContextMessage>,
    pub token_usage: TokenUsage,
    pub relevant_tools: Vec<RankedTool>,
    pub optimized_history: Vec<ContextMessage>,
}

impl Prompt {
    pub fn system_message(&self) -> Option<&ContextMessage> {
        self.messages.first()
    }

    pub fn query_message(&self) -> Option<&ContextMessage> {
        self.messages.last()
    }
}

/// Builds prompts from a session tree and a ranked tool list.
#[derive(Clone)]
pub struct PromptBuilder {
    optimizer: ConversationOptimizer,
    default_limit: usize,
    safety_margin: f64,
}

impl PromptBuilder {
    pub fn new(optimizer: ConversationOptimizer, default_limit: usize, safety_margin: f64) -> Self {
        Self {
            optimizer,
            default_limit,
            safety_margin,
        }
    }

    fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        self.optimizer.estimator()
    }

    /// Assemble `[system, ...history, query]` for `tree`'s active branch.
    ///
    /// `max_tokens` overrides the default limit for both history compression
    /// and the usage report.
    pub fn build_prompt(
        &self,
        query: &str,
        tree: &SessionTree,
        relevant_tools: &[RankedTool],
        max_tokens: Option<usize>,
    ) -> Prompt {
        let limit = max_tokens.unwrap_or(self.default_limit);
        let system = anchored(
            ContextMessage::system(render_system_prompt(tree, relevant_tools)),
            "system",
            tree,
        );
        let optimized_history = self.optimizer.compress_history(tree, limit);

        let mut messages = Vec::with_capacity(optimized_history.len() + 2);
        messages.push(system);
        messages.extend(optimized_history.iter().cloned());
        messages.push(anchored(ContextMessage::user(query), "query", tree));

        let token_usage = TokenUsage::new(self.estimator().estimate_messages(&messages), limit);
        Prompt {
            messages,
            token_usage,
            relevant_tools: relevant_tools.to_vec(),
            optimized_history,
        }
    }

    /// Return `prompt` unchanged if it fits its limit; otherwise recompress the
    /// history once at the safety margin and rebuild around the original
    /// system and query messages.
    pub fn optimize_prompt(&self, prompt: Prompt, tree: &SessionTree) -> Prompt {
        if prompt.token_usage.fits() || prompt.messages.len() < 2 {
            return prompt;
        }

        let limit = prompt.token_usage.limit;
        let target = (limit as f64 * self.safety_margin).floor() as usize;
        let optimized_history = self.optimizer.compress_history(tree, target);

        let mut messages = Vec::with_capacity(optimized_history.len() + 2);
        if let Some(system) = prompt.messages.first() {
            messages.push(system.clone());
        }
        messages.extend(optimized_history.iter().cloned());
        if let Some(query) = prompt.messages.last() {
            messages.push(query.clone());
        }

        let token_usage = TokenUsage::new(self.estimator().estimate_messages(&messages), limit);
        info!(
            before = prompt.token_usage.current,
            after = token_usage.current,
            limit,
            target,
            "Prompt over limit, history recompressed"
        );

        Prompt {
            messages,
            token_usage,
            relevant_tools: prompt.relevant_tools,
            optimized_history,
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(
            ConversationOptimizer::default(),
            DEFAULT_TOKEN_LIMIT,
            DEFAULT_SAFETY_MARGIN,
        )
    }
}

/// Pin a per-turn message to the tree's leaf: id `<prefix>-<leaf id>`,
/// timestamp of the leaf entry. Same tree and query, same prompt.
fn anchored(mut message: ContextMessage, prefix: &str, tree: &SessionTree) -> ContextMessage {
    let leaf = tree.leaf_id();
    message.id = format!("{prefix}-{leaf}");
    if let Some(entry) = tree.get_entry(leaf) {
        message.timestamp = entry.created_at();
    }
    message
}

/// Render the system message text.
pub fn render_system_prompt(tree: &SessionTree, tools: &[RankedTool]) -> String {
    let mut out = String::from(ASSISTANT_PREAMBLE);

    if let Some(header) = tree.header() {
        if !header.working_directory.is_empty() {
            out.push_str(&format!("\nWorking directory: {}", header.working_directory));
        }
    }

    if tools.is_empty() {
        out.push_str("\n\n");
        out.push_str(NO_TOOLS_LINE);
        return out;
    }

    out.push_str("\n\nYou have access to the following tools:");
    for ranked in tools {
        let tool = &ranked.tool;
        out.push_str(&format!("\n\n## {}\n{}", tool.name, tool.description));
        if !tool.functions.is_empty() {
            let names: Vec<&str> = tool.functions.iter().map(|f| f.name.as_str()).collect();
            out.push_str(&format!("\nFunctions: {}", names.join(", ")));
        }
        if !tool.permissions.is_empty() {
            out.push_str(&format!("\nPermissions: {}", tool.permissions.join(", ")));
        }
    }
    out
}
