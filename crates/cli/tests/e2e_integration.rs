//! End-to-end integration tests for the Arbor context engine.
//!
//! These tests drive the full pipeline from session mutation to prompt
//! assembly against real collaborators: the JSONL file store on a temp
//! directory and the built-in tool catalog.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_agent::{ContextEngine, TokenEstimator};
use arbor_agent::context::CharHeuristicEstimator;
use arbor_core::error::{CatalogError, Error};
use arbor_core::id::SequentialIds;
use arbor_core::message::Role;
use arbor_core::session::{PersistedEntry, TreeEntry};
use arbor_core::store::SessionStore;
use arbor_core::tool::{ToolCapability, ToolCatalog};
use arbor_store::{FileSessionStore, InMemorySessionStore};
use arbor_tools::default_catalog;

// ── Scripted catalogs ────────────────────────────────────────────────────

/// Counts how often the engine asks for the catalog.
struct CountingCatalog {
    tools: Vec<ToolCapability>,
    calls: AtomicUsize,
}

impl CountingCatalog {
    fn new(tools: Vec<ToolCapability>) -> Self {
        Self {
            tools,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ToolCatalog for CountingCatalog {
    async fn all_tools(&self) -> Result<Vec<ToolCapability>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tools.clone())
    }
}

struct OfflineCatalog;

#[async_trait::async_trait]
impl ToolCatalog for OfflineCatalog {
    async fn all_tools(&self) -> Result<Vec<ToolCapability>, CatalogError> {
        Err(CatalogError::Unavailable("registry offline".into()))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn file_engine(dir: &std::path::Path, prefix: &str) -> ContextEngine {
    ContextEngine::new(
        Arc::new(FileSessionStore::new(dir)),
        Arc::new(default_catalog()),
    )
    .with_ids(Arc::new(SequentialIds::new(prefix)))
}

fn contents(entries: &[TreeEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.as_message().map(|m| m.content.clone()))
        .collect()
}

// ── Session tree through the facade ──────────────────────────────────────

#[tokio::test]
async fn e2e_history_has_header_plus_every_append() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let sid = engine.create_session("/project").await.unwrap();

    for i in 0..7 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        engine
            .append_message(&sid, role, &format!("turn {i}"))
            .await
            .unwrap();
    }

    let history = engine.history(&sid).await.unwrap();
    assert_eq!(history.len(), 8);
    assert!(matches!(history[0], TreeEntry::Header(_)));
    let expected: Vec<String> = (0..7).map(|i| format!("turn {i}")).collect();
    assert_eq!(contents(&history), expected);
}

#[tokio::test]
async fn e2e_branch_from_header_creates_sibling_root_messages() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let h = engine.create_session("/project").await.unwrap();
    let u1 = engine.append_message(&h, Role::User, "hi").await.unwrap();
    engine.append_message(&h, Role::Assistant, "hello").await.unwrap();

    engine.branch(&h, &h).await.unwrap();
    let u2 = engine.append_message(&h, Role::User, "bye").await.unwrap();

    let tree = engine.cached_tree(&h).unwrap();
    let children: Vec<&str> = tree.children(&h).iter().map(|e| e.id()).collect();
    assert_eq!(children, vec![u1.as_str(), u2.as_str()]);
    // The abandoned branch is still intact.
    assert_eq!(tree.children(&u1).len(), 1);

    assert_eq!(contents(&engine.history(&h).await.unwrap()), vec!["bye"]);
}

#[tokio::test]
async fn e2e_sessions_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let sid;
    let u1;
    let a1;
    {
        let mut engine = file_engine(dir.path(), "a");
        sid = engine.create_session("/project").await.unwrap();
        u1 = engine.append_message(&sid, Role::User, "hi").await.unwrap();
        a1 = engine.append_message(&sid, Role::Assistant, "hello").await.unwrap();
    }

    // One engine per CLI invocation: `session append --from` branches and
    // appends in the same process.
    let reply = {
        let mut engine = file_engine(dir.path(), "b");
        // The leaf of a reloaded tree is the last persisted entry.
        assert_eq!(
            contents(&engine.history(&sid).await.unwrap()),
            vec!["hi", "hello"]
        );
        engine
            .append_from(&sid, &u1, Role::Assistant, "hey there")
            .await
            .unwrap()
    };

    let mut reopened = file_engine(dir.path(), "c");
    let history = reopened.history(&sid).await.unwrap();
    assert_eq!(contents(&history), vec!["hi", "hey there"]);
    assert_eq!(history.last().unwrap().id(), reply);
    assert_eq!(history.last().unwrap().parent_id(), Some(u1.as_str()));
    // The abandoned reply is still stored.
    let tree = reopened.cached_tree(&sid).unwrap();
    assert!(tree.has_entry(&a1));
    assert_eq!(tree.children(&u1).len(), 2);
    assert_eq!(reopened.list_sessions().await.unwrap(), vec![sid.clone()]);
}

#[tokio::test]
async fn e2e_bare_branch_does_not_outlive_its_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "a");
    let sid = engine.create_session("/project").await.unwrap();
    let u1 = engine.append_message(&sid, Role::User, "hi").await.unwrap();
    let a1 = engine.append_message(&sid, Role::Assistant, "hello").await.unwrap();
    let before = std::fs::read_to_string(dir.path().join(format!("{sid}.jsonl"))).unwrap();

    let mut brancher = file_engine(dir.path(), "b");
    brancher.branch(&sid, &u1).await.unwrap();
    let after = std::fs::read_to_string(dir.path().join(format!("{sid}.jsonl"))).unwrap();
    assert_eq!(before, after);

    let mut next = file_engine(dir.path(), "c");
    let entry = next.append_message(&sid, Role::User, "again").await.unwrap();
    let history = next.history(&sid).await.unwrap();
    assert_eq!(history.last().unwrap().id(), entry);
    assert_eq!(history.last().unwrap().parent_id(), Some(a1.as_str()));
}

#[tokio::test]
async fn e2e_fresh_engines_build_identical_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let sid = {
        let mut engine = file_engine(dir.path(), "a");
        let sid = engine.create_session("/project").await.unwrap();
        engine.append_message(&sid, Role::User, "read main.rs").await.unwrap();
        engine.append_message(&sid, Role::Assistant, "done").await.unwrap();
        sid
    };

    let first = file_engine(dir.path(), "b")
        .build_context(&sid, "search the project files", None)
        .await
        .unwrap();
    let second = file_engine(dir.path(), "c")
        .build_context(&sid, "search the project files", None)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&first.prompt).unwrap(),
        serde_json::to_value(&second.prompt).unwrap()
    );
}

#[tokio::test]
async fn e2e_persisted_shape_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let sid = engine.create_session("/project").await.unwrap();
    engine.append_message(&sid, Role::User, "hi").await.unwrap();

    let store = FileSessionStore::new(dir.path());
    let stored = store.load_tree(&sid).await.unwrap();
    let expected: Vec<PersistedEntry> = engine
        .cached_tree(&sid)
        .unwrap()
        .to_persisted();
    assert_eq!(stored, expected);

    let raw = std::fs::read_to_string(dir.path().join(format!("{sid}.jsonl"))).unwrap();
    let header: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(header["parentId"], serde_json::Value::Null);
    assert!(header.get("role").is_none());
    let message: serde_json::Value = serde_json::from_str(raw.lines().nth(1).unwrap()).unwrap();
    assert_eq!(message["parentId"], sid.as_str());
    assert_eq!(message["role"], "user");
    assert!(message["createdAt"].is_i64());
}

// ── Errors ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_unknown_session_and_entry_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");

    let err = engine.build_context("ghost", "anything", None).await.unwrap_err();
    assert!(err.is_not_found());

    let sid = engine.create_session("/project").await.unwrap();
    let err = engine.branch(&sid, "ghost-entry").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn e2e_catalog_failure_propagates_unchanged() {
    let store = InMemorySessionStore::new();
    let mut engine = ContextEngine::new(Arc::new(store), Arc::new(OfflineCatalog));
    let sid = engine.create_session("/project").await.unwrap();

    let err = engine.build_context(&sid, "read a file", None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Catalog(CatalogError::Unavailable(ref m)) if m == "registry offline"
    ));
    // Nothing was recorded for the failed turn.
    assert!(engine.get_active_sessions().is_empty());
}

// ── Context assembly ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_build_context_with_builtin_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let sid = engine.create_session("/project").await.unwrap();
    engine
        .append_message(&sid, Role::User, "Set up the repository")
        .await
        .unwrap();
    engine
        .append_message(&sid, Role::Assistant, "I created the project skeleton")
        .await
        .unwrap();

    let result = engine
        .build_context(&sid, "commit and diff the repository", None)
        .await
        .unwrap();

    assert_eq!(result.relevant_tools[0].tool.name, "git");
    assert!(result.relevant_tools.len() <= 5);
    for pair in result.relevant_tools.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let prompt = &result.prompt;
    assert_eq!(prompt.messages.len(), 4);
    assert_eq!(prompt.messages[0].role, Role::System);
    assert!(prompt.messages[0].content.contains("## git"));
    assert!(prompt.messages[0].content.contains("Working directory: /project"));
    assert_eq!(prompt.messages[3].content, "commit and diff the repository");
    assert_eq!(prompt.relevant_tools, result.relevant_tools);
    assert!(prompt.token_usage.fits());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["session_id"], sid.as_str());
    assert_eq!(json["context_stats"]["message_count"], 2);
}

#[tokio::test]
async fn e2e_build_context_is_deterministic() {
    let store = InMemorySessionStore::new();
    let catalog: Arc<dyn ToolCatalog> = Arc::new(default_catalog());
    let mut engine = ContextEngine::new(Arc::new(store), catalog)
        .with_ids(Arc::new(SequentialIds::new("s")));
    let sid = engine.create_session("/project").await.unwrap();
    for i in 0..30 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        engine
            .append_message(&sid, role, &format!("{i} {}", "tool executed ".repeat(20)))
            .await
            .unwrap();
    }

    let first = engine.build_context(&sid, "run the shell", Some(3000)).await.unwrap();
    let second = engine.build_context(&sid, "run the shell", Some(3000)).await.unwrap();

    let strip = |msgs: &[arbor_core::message::ContextMessage]| -> Vec<(String, String)> {
        msgs.iter().map(|m| (m.id.clone(), m.content.clone())).collect()
    };
    assert_eq!(
        strip(&first.prompt.optimized_history),
        strip(&second.prompt.optimized_history)
    );
    assert_eq!(first.relevant_tools, second.relevant_tools);
    assert!(first.prompt.optimized_history[0].is_summary());
    assert!(first.prompt.optimized_history[0]
        .content
        .contains("Activities: code execution, tool usage."));
}

#[tokio::test]
async fn e2e_oversized_prompt_is_recompressed_within_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let sid = engine.create_session("/project").await.unwrap();
    for i in 0..20 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        engine.append_message(&sid, role, &"x".repeat(400)).await.unwrap();
    }

    let query = "q".repeat(4000);
    let result = engine.build_context(&sid, &query, Some(2000)).await.unwrap();

    let usage = result.prompt.token_usage;
    assert_eq!(usage.limit, 2000);
    assert!(usage.fits(), "usage {} over limit", usage.current);
    let estimator = CharHeuristicEstimator::default();
    assert_eq!(estimator.estimate_messages(&result.prompt.messages), usage.current);
    assert_eq!(result.prompt.messages.last().unwrap().content, query);
}

#[tokio::test]
async fn e2e_tools_are_ranked_once_per_build() {
    let catalog = Arc::new(CountingCatalog::new(vec![
        ToolCapability::new("database", "Query relational tables").with_function("query", ""),
        ToolCapability::new("browser", "Open web pages"),
    ]));
    let mut engine = ContextEngine::new(
        Arc::new(InMemorySessionStore::new()),
        catalog.clone() as Arc<dyn ToolCatalog>,
    );
    let sid = engine.create_session("/project").await.unwrap();

    let result = engine.build_context(&sid, "query the databse", None).await.unwrap();
    assert_eq!(catalog.calls(), 1);
    assert_eq!(result.relevant_tools.len(), 1);
    assert_eq!(result.relevant_tools[0].tool.name, "database");
    assert!((result.relevant_tools[0].score - 1.0).abs() < 1e-9);
}

// ── Context windows ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_window_tracks_turns_and_is_cleaned_up() {
    let store = InMemorySessionStore::new();
    let mut engine = ContextEngine::new(Arc::new(store), Arc::new(default_catalog()));
    let a = engine.create_session("/a").await.unwrap();
    let b = engine.create_session("/b").await.unwrap();

    engine.append_message(&a, Role::User, "hi").await.unwrap();
    engine.build_context(&a, "first", None).await.unwrap();
    engine.append_message(&a, Role::Assistant, "hello").await.unwrap();
    engine.build_context(&a, "second", None).await.unwrap();
    engine.build_context(&b, "other", None).await.unwrap();

    let window: Vec<String> = engine
        .get_current_context(&a)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(window, vec!["hi", "hello"]);

    let stats = engine.get_context_stats(&a);
    assert_eq!(stats.message_count, 2);
    assert_eq!(stats.token_count, 11 + 12);
    assert!(stats.last_updated.is_some());

    let mut active = engine.get_active_sessions();
    active.sort();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(active, expected);

    assert_eq!(engine.cleanup_old_contexts(None), 0);
    assert_eq!(engine.cleanup_old_contexts(Some(0)), 2);
    assert!(engine.get_active_sessions().is_empty());
    assert!(engine.get_current_context(&a).is_empty());
}

#[tokio::test]
async fn e2e_window_overflow_is_optimized() {
    let store = InMemorySessionStore::new();
    let mut engine = ContextEngine::new(Arc::new(store), Arc::new(default_catalog()));
    let sid = engine.create_session("/project").await.unwrap();

    // 110 tokens per turn: the window passes 1600 on the 15th turn.
    for i in 0..20 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        engine.append_message(&sid, role, &"w".repeat(400)).await.unwrap();
        engine.build_context(&sid, "next", Some(1600)).await.unwrap();
        assert!(!engine.needs_optimization(&sid, Some(1600)));
    }

    let window = engine.get_current_context(&sid);
    assert!(window[0].is_summary());
    assert!(window.len() < 20);
}

#[tokio::test]
async fn e2e_optimize_conversation_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = file_engine(dir.path(), "s");
    let sid = engine.create_session("/project").await.unwrap();
    for _ in 0..50 {
        engine.append_message(&sid, Role::User, &"z".repeat(400)).await.unwrap();
    }

    // Only a summary or nothing fits once the reserve is taken.
    let out = engine.optimize_conversation(&sid, Some(1000)).await.unwrap();
    assert!(out.is_empty());
    let out = engine.optimize_conversation(&sid, Some(1100)).await.unwrap();
    assert_eq!(out.len(), 1);
    assert!(out[0].is_summary());

    engine.build_context(&sid, "hello", None).await.unwrap();
    assert!(!engine.get_current_context(&sid).is_empty());
    engine.clear_context(&sid);
    assert!(engine.get_current_context(&sid).is_empty());
    // Clearing a window leaves the stored session alone.
    assert_eq!(engine.history(&sid).await.unwrap().len(), 51);
}
