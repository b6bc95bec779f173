//! `arbor session`: Session lifecycle commands.

use arbor_core::message::Role;
use arbor_core::session::{PersistedEntry, TreeEntry};

use super::{build_engine, load_config};

pub async fn new(dir: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut engine = build_engine(&config, None)?;

    let dir = match dir {
        Some(d) => d,
        None => std::env::current_dir()?.display().to_string(),
    };
    let session_id = engine.create_session(&dir).await?;
    println!("{session_id}");
    Ok(())
}

pub async fn append(
    session_id: &str,
    role: &str,
    content: &str,
    from: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let role: Role = role.parse()?;
    let config = load_config()?;
    let mut engine = build_engine(&config, None)?;

    let entry_id = match from {
        Some(parent) => {
            let id = engine.append_from(session_id, parent, role, content).await?;
            eprintln!("🌿 Branched from {parent}");
            id
        }
        None => engine.append_message(session_id, role, content).await?,
    };
    println!("{entry_id}");
    Ok(())
}

pub async fn history(session_id: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut engine = build_engine(&config, None)?;
    let entries = engine.history(session_id).await?;

    if json {
        let persisted: Vec<PersistedEntry> = entries.iter().map(PersistedEntry::from).collect();
        println!("{}", serde_json::to_string_pretty(&persisted)?);
        return Ok(());
    }

    for entry in &entries {
        match entry {
            TreeEntry::Header(h) => {
                println!("📁 {} ({})", h.id, h.working_directory);
            }
            TreeEntry::Message(m) => {
                let preview: String = m.content.chars().take(80).collect();
                println!("  {:<9} {}  {}", m.role.as_str(), m.id, preview);
            }
        }
    }
    Ok(())
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config, None)?;

    let sessions = engine.list_sessions().await?;
    if sessions.is_empty() {
        println!("   No sessions found ({} store).", engine.store_name());
    }
    for id in sessions {
        println!("{id}");
    }
    Ok(())
}

pub async fn delete(session_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut engine = build_engine(&config, None)?;

    if engine.delete_session(session_id).await? {
        println!("🗑️  Deleted {session_id}");
    } else {
        println!("   No session named {session_id}");
    }
    Ok(())
}
