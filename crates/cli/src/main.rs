mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use runtime::{AnthropicBackend, Backend, GeminiBackend, Session, SessionOptions, ToolRegistry};
use storage::{Event, EventKind, EventStore, Role};
use tracing_subscriber::EnvFilter;

use config::{BackendKind, Config};
use error::{Error, Result};

const CONFIG_FILE: &str = "valet.toml";

#[derive(Parser)]
#[command(name = "valet")]
#[command(about = "A personal assistant with MCP tool providers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// List all sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show event logs for a session
    Logs {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
        /// Filter by event kind (message, tool_call, tool_result, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat().await,
        Some(Commands::Sessions { limit }) => cmd_sessions(limit),
        Some(Commands::Logs { session, kind }) => cmd_logs(&session, kind.as_deref()),
    }
}

async fn cmd_chat() -> Result<()> {
    println!("valet v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let api_key_var = config.backend.api_key_env().to_string();
    let api_key = std::env::var(&api_key_var)
        .map_err(|_| Error::MissingApiKey { var: api_key_var })?;
    let model = config.backend.model().to_string();

    // Connect tool providers; failures are logged and skipped, the
    // session runs with whatever connected.
    let provider_configs = config
        .providers
        .iter()
        .map(|p| p.to_provider_config())
        .collect();
    let registry = Arc::new(ToolRegistry::connect(provider_configs).await);
    println!(
        "Tools: {} (from {} configured provider(s))",
        registry.tool_count(),
        config.providers.len()
    );

    // Initialize event store
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".valet".into());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("events.db");
    let store = EventStore::open(&db_path)?;
    println!("Session stored at: {}", db_path.display());
    println!("Model: {model}");

    let options = config.session.to_options();
    let result = match config.backend.kind {
        BackendKind::Gemini => {
            let backend = GeminiBackend::new(api_key, &model);
            chat_loop(store, backend, registry.clone(), options).await
        }
        BackendKind::Anthropic => {
            let backend = AnthropicBackend::builder(api_key, &model).build();
            chat_loop(store, backend, registry.clone(), options).await
        }
    };

    // Providers are released in reverse-acquisition order even when the
    // loop exits with an error.
    registry.shutdown().await;
    result?;

    println!("\nSession ended.");
    Ok(())
}

async fn chat_loop<B: Backend>(
    store: EventStore,
    backend: B,
    registry: Arc<ToolRegistry>,
    options: SessionOptions,
) -> Result<()> {
    let mut session = Session::new(store, backend, registry)?.with_options(options);
    println!("Session ID: {}", session.id);
    println!("Type your queries, 'clear' to reset history, or 'quit' to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            session.reset()?;
            println!("Conversation history cleared.\n");
            continue;
        }

        // A failed turn never kills the loop; history up to this point is
        // preserved so the user can retry.
        match session.chat(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    session.end()?;
    Ok(())
}

fn cmd_sessions(limit: usize) -> Result<()> {
    let store = open_store()?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<8}  STATUS",
        "SESSION ID", "STARTED", "MSGS"
    );
    println!("{}", "-".repeat(80));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.started_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let status = if summary.ended_at.is_some() {
            "ended"
        } else {
            "active"
        };
        println!(
            "{:<36}  {:<20}  {:<8}  {status}",
            summary.id, started, summary.message_count
        );
    }

    Ok(())
}

fn cmd_logs(session_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store()?;

    // Find session by prefix
    let sessions = store.list_sessions()?;
    let matching: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(session_prefix))
        .collect();

    let session_id = match matching.len() {
        0 => {
            return Err(Error::SessionNotFound {
                prefix: session_prefix.to_string(),
            });
        }
        1 => matching[0].id,
        _ => {
            return Err(Error::AmbiguousSession {
                prefix: session_prefix.to_string(),
                matches: matching.iter().map(|s| s.id.to_string()).collect(),
            });
        }
    };

    let events = store.load_events(session_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::SessionStart => {
            println!("[{time}] === Session started ===");
        }
        EventKind::SessionEnd => {
            println!("[{time}] === Session ended ===");
        }
        EventKind::ProviderConnected { provider, tools } => {
            println!("[{time}] PROVIDER: {provider} ({} tools)", tools.len());
        }
        EventKind::HistoryCleared => {
            println!("[{time}] --- History cleared ---");
        }
        EventKind::Message { role, content } => {
            let role_str = match role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
            };
            println!("[{time}] {role_str}: {}", truncate(content, 200));
        }
        EventKind::ToolCall {
            call_id,
            name,
            arguments,
        } => {
            println!("[{time}] TOOL CALL [{call_id}]: {name} {arguments}");
        }
        EventKind::ToolResult {
            call_id,
            name,
            is_error,
            content,
        } => {
            let marker = if *is_error { "ERROR" } else { "OK" };
            println!(
                "[{time}] TOOL RESULT [{call_id}]: {name} {marker}: {}",
                truncate(content, 200)
            );
        }
    }
}

// Truncate long content for display, on a char boundary.
fn truncate(content: &str, max: usize) -> String {
    if content.len() <= max {
        return content.to_string();
    }
    let mut end = max;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &content[..end])
}

fn open_store() -> Result<EventStore> {
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".valet".into());
    let db_path = data_dir.join("events.db");

    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    Ok(EventStore::open(&db_path)?)
}

fn load_config() -> Result<Config> {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        println!("Config: {CONFIG_FILE}");
        Ok(Config::load(&path)?)
    } else {
        println!("Config: default (no {CONFIG_FILE} found, no tool providers)");
        Ok(Config::default())
    }
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/valet"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("valet"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("valet"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
