//! `arbor tools`: Show how the catalog ranks against a query.

use std::path::PathBuf;

use arbor_agent::ToolAnalyzer;

use super::{load_config, open_catalog};

pub async fn run(
    query: &str,
    limit: Option<usize>,
    catalog: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let limit = limit.unwrap_or(config.context.max_relevant_tools);
    let analyzer = ToolAnalyzer::new(open_catalog(catalog.as_deref())?);

    println!("🔍 Ranking tools for: \"{query}\"");
    println!();

    let ranked = analyzer.find_relevant_tools(query, limit).await?;
    if ranked.is_empty() {
        println!("   No relevant tools.");
    }
    for (i, r) in ranked.iter().enumerate() {
        println!("  {:>2}. [score: {:.2}] {}", i + 1, r.score, r.tool.name);
        println!("      {}", r.tool.description);
    }
    Ok(())
}
