//! Tool catalog implementations for Arbor.
//!
//! The execution engine owns the tools themselves. This crate only supplies
//! their descriptions for relevance ranking and prompt assembly: a mutable
//! in-process catalog and the set of built-in capabilities.

pub mod catalog;

use arbor_core::tool::ToolCapability;

pub use catalog::StaticToolCatalog;

/// Descriptions of the built-in tools, in catalog order.
pub fn builtin_tools() -> Vec<ToolCapability> {
    vec![
        ToolCapability::new(
            "code_executor",
            "Execute code snippets in an isolated sandbox and return their output",
        )
        .with_function("run_python", "Run a Python snippet")
        .with_function("run_javascript", "Run a JavaScript snippet")
        .with_function("run_shell", "Run a shell script")
        .with_permission("sandbox:execute"),
        ToolCapability::new(
            "file_system",
            "Read, write, list and search files inside the working directory",
        )
        .with_function("read_file", "Read a file")
        .with_function("write_file", "Create or overwrite a file")
        .with_function("list_directory", "List directory contents")
        .with_function("search_files", "Search file contents")
        .with_permission("fs:read")
        .with_permission("fs:write"),
        ToolCapability::new("shell", "Run allowlisted commands in a terminal session")
            .with_function("execute", "Run a command")
            .with_permission("process:spawn"),
        ToolCapability::new("web_search", "Search the web and fetch page content")
            .with_function("search", "Query a search engine")
            .with_function("fetch", "Download a page as text")
            .with_permission("network:outbound"),
        ToolCapability::new("git", "Inspect and modify version control state of the repository")
            .with_function("status", "Show working tree status")
            .with_function("diff", "Show changes")
            .with_function("commit", "Record changes")
            .with_function("branch", "List or create branches")
            .with_permission("fs:read")
            .with_permission("fs:write"),
        ToolCapability::new("package_manager", "Install and manage project dependencies")
            .with_function("install", "Install a package")
            .with_function("update", "Update packages")
            .with_permission("network:outbound")
            .with_permission("fs:write"),
    ]
}

/// Create a catalog holding every built-in tool.
pub fn default_catalog() -> StaticToolCatalog {
    StaticToolCatalog::from_tools(builtin_tools())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::tool::ToolCatalog;
    use std::collections::HashSet;

    #[test]
    fn builtin_names_are_unique() {
        let tools = builtin_tools();
        let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn every_builtin_declares_functions_and_permissions() {
        for tool in builtin_tools() {
            assert!(!tool.functions.is_empty(), "{} has no functions", tool.name);
            assert!(!tool.permissions.is_empty(), "{} has no permissions", tool.name);
        }
    }

    #[tokio::test]
    async fn default_catalog_lists_builtins() {
        let catalog = default_catalog();
        let tools = catalog.all_tools().await.unwrap();
        assert_eq!(tools.len(), builtin_tools().len());
        assert_eq!(tools[0].name, "code_executor");
    }
}
