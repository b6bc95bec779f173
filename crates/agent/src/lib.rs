//! The Arbor context engine.
//!
//! Given a session and a new user query, the engine produces the prompt an
//! assistant model should see next:
//!
//! 1. **Resolve** the session tree (cache, then store)
//! 2. **Rank** catalog tools against the query
//! 3. **Compress** the active branch's history into the token budget
//! 4. **Assemble** `[system, ...history, query]` and recompress once if over limit
//! 5. **Record** the new turns in the session's rolling context window
//!
//! [`ContextEngine`] is the facade; the stages live under [`context`].

pub mod context;
pub mod engine;

pub use context::{
    CharHeuristicEstimator, ContextManager, ContextStats, ContextWindow, ConversationOptimizer,
    Prompt, PromptBuilder, RankedTool, TokenEstimator, TokenUsage, ToolAnalyzer,
};
pub use engine::{ContextEngine, ContextResult};
