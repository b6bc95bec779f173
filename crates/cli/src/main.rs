//! Arbor CLI: the main entry point.
//!
//! Commands:
//! - `session`: Create, extend (optionally from an earlier entry), and inspect sessions
//! - `context`: Assemble the prompt for a query on a session
//! - `tools`: Rank the tool catalog against a query
//! - `config`: Show, locate, or validate configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: branching sessions and token-budgeted prompt assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage conversation sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Build the prompt for a query on a session (JSON output)
    Context {
        /// Session id
        session: String,

        /// The new user query
        query: String,

        /// Token limit for the prompt
        #[arg(short, long)]
        max_tokens: Option<usize>,

        /// Load tool descriptions from a JSON file instead of the built-ins
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Rank catalog tools against a query
    Tools {
        query: String,

        /// Maximum number of tools to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Load tool descriptions from a JSON file instead of the built-ins
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a new session
    New {
        /// Working directory recorded in the session header
        #[arg(short, long)]
        dir: Option<String>,
    },

    /// Append a message at the session's latest entry, or branch from `--from`
    Append {
        session: String,

        /// user, assistant, or system
        role: String,

        content: String,

        /// Attach the message to this entry instead, starting a new branch
        #[arg(long, value_name = "ENTRY")]
        from: Option<String>,
    },

    /// Print the active branch, root to leaf
    History {
        session: String,

        /// Print raw JSON entries
        #[arg(long)]
        json: bool,
    },

    /// List stored sessions
    List,

    /// Delete a stored session
    Delete { session: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the config file
    Validate,
    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::New { dir } => commands::session::new(dir).await?,
            SessionAction::Append {
                session,
                role,
                content,
                from,
            } => commands::session::append(&session, &role, &content, from.as_deref()).await?,
            SessionAction::History { session, json } => {
                commands::session::history(&session, json).await?
            }
            SessionAction::List => commands::session::list().await?,
            SessionAction::Delete { session } => commands::session::delete(&session).await?,
        },
        Commands::Context {
            session,
            query,
            max_tokens,
            catalog,
        } => commands::context::run(&session, &query, max_tokens, catalog).await?,
        Commands::Tools {
            query,
            limit,
            catalog,
        } => commands::tools::run(&query, limit, catalog).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
