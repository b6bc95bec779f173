//! `arbor context`: Assemble a prompt and print it as JSON.

use std::path::PathBuf;

use super::{build_engine, load_config};

pub async fn run(
    session_id: &str,
    query: &str,
    max_tokens: Option<usize>,
    catalog: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut engine = build_engine(&config, catalog.as_deref())?;

    let result = engine.build_context(session_id, query, max_tokens).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
