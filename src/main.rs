use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

mod app;
mod backend;
mod chat;
mod config;
mod handler;
mod logging;
mod message;
mod session;
mod theme;
mod tui;
mod ui;

use app::App;
use backend::HttpBackend;
use chat::Chat;
use config::Config;
use message::{RandomIds, SequentialIds};
use session::SessionStore;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "guthealth", version)]
#[command(about = "Chat with the GutHealth AI digestive wellness assistant")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "GUTHEALTH_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Check whether the backend is up
    Health,
    /// Inspect or forget the stored session id
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print the stored session id
    Show {
        /// Also fetch what the backend knows about this session
        #[arg(long)]
        remote: bool,
    },
    /// Forget the stored session id; the next chat starts a new one
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location and its values
    Show,
    /// Save a backend base URL to use when --endpoint is not given
    SetEndpoint { url: String },
    /// Save the default log filter, e.g. "debug" or "guthealth=trace"
    SetLogLevel { level: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file shouldn't lock anyone out of chatting
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {}", e);
        Config::new()
    });
    let endpoint = config.resolve_endpoint(cli.endpoint.as_deref());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, endpoint).await,
        Commands::Ask { question } => {
            logging::init_stderr(config.log_level.as_deref());
            ask(&endpoint, &question.join(" ")).await
        }
        Commands::Health => {
            logging::init_stderr(config.log_level.as_deref());
            health(&endpoint).await
        }
        Commands::Session { action } => {
            logging::init_stderr(config.log_level.as_deref());
            session_command(&endpoint, action).await
        }
        Commands::Config { action } => config_command(config, action),
    }
}

async fn run_chat(config: &Config, endpoint: String) -> Result<()> {
    let _log_guard = logging::init_file(&session::data_dir()?, config.log_level.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), endpoint = %endpoint, "starting chat");

    let session_id = SessionStore::open_default()?.get_or_create()?;
    let backend = HttpBackend::new(&endpoint);
    let chat = Chat::new(Arc::new(backend.clone()), session_id, Box::new(RandomIds));

    let mut app = App::new(chat, endpoint);
    app.spawn_health_check(backend);
    info!(session_id = %app.chat.session_id(), "session ready");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run_loop(&mut terminal, &mut app).await;

    app.shutdown();
    info!(messages = app.chat.messages().len(), "chat closed");
    finish(result, tui::restore())
}

/// The loop's own error wins over a failed terminal restore, which is only logged then
fn finish(result: Result<()>, restored: Result<()>) -> Result<()> {
    match (result, restored) {
        (Err(e), Err(restore_err)) => {
            error!(error = %restore_err, "could not restore terminal");
            Err(e)
        }
        (result, restored) => result.and(restored),
    }
}

async fn run_loop(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(tui::TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

async fn ask(endpoint: &str, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Question is empty");
    }

    let session_id = SessionStore::open_default()?.get_or_create()?;
    let backend = Arc::new(HttpBackend::new(endpoint));
    let mut chat = Chat::new(backend, session_id, Box::new(SequentialIds::new()));

    let reply = chat.submit(question).await?;
    println!("{}", reply.content);

    Ok(())
}

async fn health(endpoint: &str) -> Result<()> {
    let backend = HttpBackend::new(endpoint);

    match backend.health().await {
        Ok(health) => {
            println!("{}: {} ({})", backend.base_url(), health.status, health.message);
            if !health.is_healthy() {
                bail!("Backend is not healthy");
            }
            Ok(())
        }
        Err(e) => bail!("Could not reach {}: {}", backend.base_url(), e),
    }
}

async fn session_command(endpoint: &str, action: SessionAction) -> Result<()> {
    let store = SessionStore::open_default()?;

    match action {
        SessionAction::Show { remote } => {
            let Some(session_id) = store.get()? else {
                println!("No session yet (stored in {})", store.path().display());
                return Ok(());
            };
            println!("{}", session_id);

            if remote {
                let backend = HttpBackend::new(endpoint);
                match backend.session_info(&session_id).await {
                    Ok(info) => {
                        println!("  queries:    {}", info.query_count);
                        println!("  created:    {}", info.created_at.as_deref().unwrap_or("-"));
                        println!("  last query: {}", info.last_query.as_deref().unwrap_or("-"));
                    }
                    Err(e) => println!("  backend has no record of it ({})", e),
                }
            }
        }
        SessionAction::Reset => {
            let Some(session_id) = store.get()? else {
                println!("No session to reset");
                return Ok(());
            };

            // The backend only keeps sessions in memory, so a failure here is not fatal
            if let Err(e) = HttpBackend::new(endpoint).delete_session(&session_id).await {
                warn!(error = %e, "could not delete session on backend");
            }

            store.clear()?;
            println!("Forgot session {}", session_id);
        }
    }

    Ok(())
}

fn config_command(mut config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", Config::get_config_path()?.display());
            println!("  endpoint:  {}", config.resolve_endpoint(None));
            println!("  log level: {}", config.log_level.as_deref().unwrap_or("info"));
        }
        ConfigAction::SetEndpoint { url } => {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                bail!("Endpoint is empty");
            }
            config.endpoint = Some(url.to_string());
            config.save()?;
            println!("Endpoint set to {}", url);
        }
        ConfigAction::SetLogLevel { level } => {
            config.log_level = Some(level.trim().to_string());
            config.save()?;
            println!("Log level set to {}", level.trim());
        }
    }

    Ok(())
}
