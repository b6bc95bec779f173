//! Context pipeline: from a session tree to a bounded prompt.
//!
//! # Stages
//!
//! | Stage | Module | Bound |
//! |-------|--------|-------|
//! | 1. Token estimation | [`token`] | Pluggable, heuristic by default |
//! | 2. Tool ranking | [`tool_analyzer`] | Top-N non-zero scores |
//! | 3. History compression | [`optimizer`] | Newest first, older turns summarized |
//! | 4. Prompt assembly | [`prompt`] | One recompression pass at the safety margin |
//! | 5. Context windows | [`window`] | Per-session, idle windows evicted |

pub mod optimizer;
pub mod prompt;
pub mod token;
pub mod tool_analyzer;
pub mod window;

pub use optimizer::{ConversationOptimizer, DEFAULT_RESERVED_TOKENS, summarize};
pub use prompt::{
    DEFAULT_SAFETY_MARGIN, DEFAULT_TOKEN_LIMIT, Prompt, PromptBuilder, TokenUsage,
    render_system_prompt,
};
pub use token::{CharHeuristicEstimator, TokenEstimator};
pub use tool_analyzer::{
    DEFAULT_MAX_RESULTS, RankedTool, ToolAnalyzer, rank_tools, score_tool_relevance,
};
pub use window::{ContextManager, ContextStats, ContextWindow, DEFAULT_MAX_AGE_MS};
