//! Tool relevance ranking.
//!
//! Scores each catalog tool against a free-text query with a bounded,
//! deterministic heuristic: substring or small-edit-distance matches against
//! the tool name, its description words, and its sub-function names.
//!
//! | Signal | Weight |
//! |--------|--------|
//! | Any query word fuzzy-matches the tool name | +0.8 once |
//! | Each (description word, query word) fuzzy match | +0.2 |
//! | Each sub-function whose name contains or is contained by a query word | +0.5 |
//!
//! The sum is capped at 1.0. Query words of three characters or fewer are
//! ignored; matching is case-insensitive.

use std::sync::Arc;

use arbor_core::error::CatalogError;
use arbor_core::tool::{ToolCapability, ToolCatalog};
use serde::Serialize;
use tracing::debug;

const NAME_MATCH_WEIGHT: f64 = 0.8;
const DESCRIPTION_MATCH_WEIGHT: f64 = 0.2;
const FUNCTION_MATCH_WEIGHT: f64 = 0.5;
/// Query words this short or shorter carry no signal.
const MIN_QUERY_WORD_LEN: usize = 3;
const MAX_EDIT_DISTANCE: usize = 2;

pub const DEFAULT_MAX_RESULTS: usize = 5;

/// A catalog tool paired with its relevance to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTool {
    pub tool: ToolCapability,
    /// In `[0.0, 1.0]`.
    pub score: f64,
}

/// Ranks the tools of a catalog against queries.
#[derive(Clone)]
pub struct ToolAnalyzer {
    catalog: Arc<dyn ToolCatalog>,
}

impl ToolAnalyzer {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self { catalog }
    }

    /// Score the whole catalog and return the `max_results` best non-zero matches.
    pub async fn find_relevant_tools(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RankedTool>, CatalogError> {
        let tools = self.catalog.all_tools().await?;
        let ranked = rank_tools(&tools, query, max_results);
        debug!(
            catalog = tools.len(),
            matched = ranked.len(),
            top = ranked.first().map(|r| r.tool.name.as_str()).unwrap_or("-"),
            "Ranked tools"
        );
        Ok(ranked)
    }
}

/// Rank `tools` against `query`: zero scores dropped, sorted by descending
/// score, ties kept in catalog order, truncated to `max_results`.
pub fn rank_tools(tools: &[ToolCapability], query: &str, max_results: usize) -> Vec<RankedTool> {
    let mut ranked: Vec<RankedTool> = tools
        .iter()
        .map(|tool| RankedTool {
            score: score_tool_relevance(tool, query),
            tool: tool.clone(),
        })
        .filter(|r| r.score > 0.0)
        .collect();
    // `sort_by` is stable, so equal scores keep catalog order.
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(max_results);
    ranked
}

/// Relevance of `tool` to `query`, in `[0.0, 1.0]`.
pub fn score_tool_relevance(tool: &ToolCapability, query: &str) -> f64 {
    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_QUERY_WORD_LEN)
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;

    let name = tool.name.to_lowercase();
    if words.iter().any(|w| fuzzy_match(w, &name)) {
        score += NAME_MATCH_WEIGHT;
    }

    let description = tool.description.to_lowercase();
    for desc_word in description.split_whitespace() {
        for word in &words {
            if fuzzy_match(word, desc_word) {
                score += DESCRIPTION_MATCH_WEIGHT;
            }
        }
    }

    for function in &tool.functions {
        let fname = function.name.to_lowercase();
        if words
            .iter()
            .any(|w| fname.contains(w) || w.contains(fname.as_str()))
        {
            score += FUNCTION_MATCH_WEIGHT;
        }
    }

    f64::min(score, 1.0)
}

/// Substring in either direction, or Levenshtein distance of at most 2.
fn fuzzy_match(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a) || strsim::levenshtein(a, b) <= MAX_EDIT_DISTANCE
}
