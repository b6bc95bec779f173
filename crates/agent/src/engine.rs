//! The context engine facade.
//!
//! [`ContextEngine`] owns a process-local cache of session trees, writes every
//! appended entry through to the [`SessionStore`] before returning, and turns a
//! `(session, query)` pair into a bounded prompt via [`ContextEngine::build_context`].
//!
//! Callers serialize operations per session; the engine itself does no locking.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_config::{AppConfig, ContextConfig};
use arbor_core::error::{Result, SessionError};
use arbor_core::id::{IdGenerator, UuidGenerator};
use arbor_core::message::{ContextMessage, Role};
use arbor_core::session::{SessionTree, TreeEntry};
use arbor_core::store::SessionStore;
use arbor_core::tool::ToolCatalog;
use serde::Serialize;
use tracing::{debug, info};

use crate::context::{
    CharHeuristicEstimator, ContextManager, ContextStats, ConversationOptimizer, Prompt,
    PromptBuilder, RankedTool, ToolAnalyzer,
};

/// Everything `build_context` produces for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub session_id: String,
    pub prompt: Prompt,
    pub relevant_tools: Vec<RankedTool>,
    pub context_stats: ContextStats,
}

pub struct ContextEngine {
    store: Arc<dyn SessionStore>,
    analyzer: ToolAnalyzer,
    optimizer: ConversationOptimizer,
    builder: PromptBuilder,
    contexts: ContextManager,
    trees: HashMap<String, SessionTree>,
    ids: Arc<dyn IdGenerator>,
    settings: ContextConfig,
}

impl ContextEngine {
    /// An engine with default budgets and the character heuristic estimator.
    pub fn new(store: Arc<dyn SessionStore>, catalog: Arc<dyn ToolCatalog>) -> Self {
        Self::from_config(&AppConfig::default(), store, catalog)
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn ToolCatalog>,
    ) -> Self {
        let estimator = Arc::new(CharHeuristicEstimator::from_config(&config.tokens));
        let optimizer = ConversationOptimizer::new(estimator, config.context.reserved_tokens);
        let builder = PromptBuilder::new(
            optimizer.clone(),
            config.context.default_max_tokens,
            config.context.safety_margin,
        );

        Self {
            store,
            analyzer: ToolAnalyzer::new(catalog),
            contexts: ContextManager::new(optimizer.clone()),
            optimizer,
            builder,
            trees: HashMap::new(),
            ids: Arc::new(UuidGenerator),
            settings: config.context.clone(),
        }
    }

    /// Use `ids` for new sessions and entries.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    // --- Session lifecycle ---

    /// Create and persist a new session; returns its id (the header id).
    pub async fn create_session(&mut self, working_directory: &str) -> Result<String> {
        let tree = SessionTree::with_ids(working_directory, self.ids.clone());
        let session_id = tree.root_id().to_string();
        self.store.save_tree(&session_id, &tree.to_persisted()).await?;
        info!(session_id = %session_id, working_directory, "Session created");
        self.trees.insert(session_id.clone(), tree);
        Ok(session_id)
    }

    /// Append a message at the session's leaf; returns the new entry id.
    pub async fn append_message(
        &mut self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String> {
        self.ensure_loaded(session_id).await?;
        let mut tree = self.cached(session_id)?.clone();
        let entry_id = tree.append_message(role, content);
        self.commit(session_id, tree).await?;
        debug!(session_id, entry_id = %entry_id, role = %role, "Message appended");
        Ok(entry_id)
    }

    /// Move the cached leaf to `entry_id`.
    ///
    /// The leaf is not persisted: a reload resumes at the last stored entry,
    /// so the branch lasts only while this engine caches the tree. Use
    /// [`append_from`](Self::append_from) to branch and persist in one step.
    pub async fn branch(&mut self, session_id: &str, entry_id: &str) -> Result<()> {
        self.ensure_loaded(session_id).await?;
        let tree = self
            .trees
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        tree.branch(entry_id)?;
        debug!(session_id, entry_id, "Branched");
        Ok(())
    }

    /// Append a message as a child of `parent_id`; returns the new entry id.
    ///
    /// The new entry is persisted, and as the last stored entry it is also
    /// the leaf any later reload resumes from.
    pub async fn append_from(
        &mut self,
        session_id: &str,
        parent_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String> {
        self.ensure_loaded(session_id).await?;
        let mut tree = self.cached(session_id)?.clone();
        tree.branch(parent_id)?;
        let entry_id = tree.append_message(role, content);
        self.commit(session_id, tree).await?;
        debug!(session_id, parent_id, entry_id = %entry_id, role = %role, "Message appended on branch");
        Ok(entry_id)
    }

    /// Root → leaf entries of the session's active branch.
    pub async fn history(&mut self, session_id: &str) -> Result<Vec<TreeEntry>> {
        self.ensure_loaded(session_id).await?;
        Ok(self.cached(session_id)?.history().into_iter().cloned().collect())
    }

    /// The cached tree, if the session has been loaded.
    pub fn cached_tree(&self, session_id: &str) -> Option<&SessionTree> {
        self.trees.get(session_id)
    }

    /// Remove a session from the store, the cache, and the window map.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<bool> {
        let existed = self.store.delete_tree(session_id).await?;
        self.trees.remove(session_id);
        self.contexts.clear_context(session_id);
        info!(session_id, existed, "Session deleted");
        Ok(existed)
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.store.list_sessions().await?)
    }

    // --- Context assembly ---

    /// Assemble the prompt for `query` on the session's active branch.
    ///
    /// Resolves the tree, ranks tools, builds and if needed recompresses the
    /// prompt, then records the turn's raw history in the session's window.
    pub async fn build_context(
        &mut self,
        session_id: &str,
        query: &str,
        max_tokens: Option<usize>,
    ) -> Result<ContextResult> {
        let limit = max_tokens.unwrap_or(self.settings.default_max_tokens);
        self.ensure_loaded(session_id).await?;

        let relevant_tools = self
            .analyzer
            .find_relevant_tools(query, self.settings.max_relevant_tools)
            .await?;

        let tree = self.cached(session_id)?;
        let prompt = self
            .builder
            .build_prompt(query, tree, &relevant_tools, Some(limit));
        let prompt = self.builder.optimize_prompt(prompt, tree);

        let fresh: Vec<ContextMessage> = prompt
            .optimized_history
            .iter()
            .filter(|m| !m.is_summary() && !self.contexts.has_recorded(session_id, &m.id))
            .cloned()
            .collect();
        self.contexts.update_context_window(session_id, fresh, limit);
        let context_stats = self.contexts.get_context_stats(session_id);

        info!(
            session_id,
            tools = relevant_tools.len(),
            history = prompt.optimized_history.len(),
            tokens = prompt.token_usage.current,
            limit,
            "Context built"
        );

        Ok(ContextResult {
            session_id: session_id.to_string(),
            prompt,
            relevant_tools,
            context_stats,
        })
    }

    /// Compress the session's active history into `max_tokens`
    /// (default `optimize_max_tokens`).
    pub async fn optimize_conversation(
        &mut self,
        session_id: &str,
        max_tokens: Option<usize>,
    ) -> Result<Vec<ContextMessage>> {
        let limit = max_tokens.unwrap_or(self.settings.optimize_max_tokens);
        self.ensure_loaded(session_id).await?;
        Ok(self.optimizer.compress_history(self.cached(session_id)?, limit))
    }

    // --- Context windows ---

    pub fn get_current_context(&self, session_id: &str) -> Vec<ContextMessage> {
        self.contexts.get_current_context(session_id)
    }

    pub fn get_context_stats(&self, session_id: &str) -> ContextStats {
        self.contexts.get_context_stats(session_id)
    }

    pub fn clear_context(&mut self, session_id: &str) {
        self.contexts.clear_context(session_id);
    }

    pub fn needs_optimization(&self, session_id: &str, max_tokens: Option<usize>) -> bool {
        let limit = max_tokens.unwrap_or(self.settings.default_max_tokens);
        self.contexts.needs_optimization(session_id, limit)
    }

    pub fn get_active_sessions(&self) -> Vec<String> {
        self.contexts.active_sessions()
    }

    /// Evict windows idle for longer than `max_age_ms`
    /// (default `context_max_age_ms`) along with their cached trees;
    /// returns how many windows were removed. Evicted sessions reload from
    /// the store on next use.
    pub fn cleanup_old_contexts(&mut self, max_age_ms: Option<u64>) -> usize {
        let max_age = max_age_ms.unwrap_or(self.settings.context_max_age_ms);
        let evicted = self.contexts.evict_idle(max_age);
        for session_id in &evicted {
            self.trees.remove(session_id);
        }
        evicted.len()
    }

    // --- Internals ---

    /// Load the session from the store on a cache miss.
    async fn ensure_loaded(&mut self, session_id: &str) -> Result<()> {
        if self.trees.contains_key(session_id) {
            return Ok(());
        }
        let entries = self.store.load_tree(session_id).await?;
        let tree = SessionTree::from_persisted(entries, self.ids.clone())?;
        debug!(session_id, entries = tree.entry_count(), "Session loaded from store");
        self.trees.insert(session_id.to_string(), tree);
        Ok(())
    }

    fn cached(&self, session_id: &str) -> Result<&SessionTree> {
        self.trees
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()).into())
    }

    /// Persist `tree`, then replace the cached copy.
    async fn commit(&mut self, session_id: &str, tree: SessionTree) -> Result<()> {
        self.store.save_tree(session_id, &tree.to_persisted()).await?;
        self.trees.insert(session_id.to_string(), tree);
        Ok(())
    }
}
