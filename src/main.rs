use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unichatbot_core::config::BACKEND_HTTP_ENV;
use unichatbot_core::{
    BackendKind, ChatRole, ChatSession, Config, FileSelection, HttpTransport, Ingestor, Uploader,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "unichatbot")]
#[command(version, about = "Chat with the UniChatBot assistant, upload and ingest PDFs")]
struct Cli {
    /// Base address of the backend service
    #[arg(long, global = true, env = BACKEND_HTTP_ENV)]
    backend_http: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,
    /// Ask one question and print the answer with its sources
    Ask {
        /// Your question
        question: String,
        /// Vector store to query (chroma or weaviate)
        #[arg(short, long, value_parser = parse_backend)]
        backend: Option<BackendKind>,
    },
    /// Upload PDF files to the server
    Upload {
        /// PDF files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ingest uploaded PDFs into a vector store
    Ingest {
        /// Vector store to rebuild (chroma or weaviate)
        #[arg(short, long, value_parser = parse_backend)]
        backend: Option<BackendKind>,
        /// Keep the existing index instead of rebuilding it
        #[arg(long)]
        no_reset: bool,
    },
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    BackendKind::parse(s).ok_or_else(|| format!("unknown backend '{}', expected chroma or weaviate", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {}", e);
        Config::new()
    });
    let backend_http = config.resolve_backend_http(cli.backend_http.as_deref());

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            init_file_logging()?;
            run_tui(&config, backend_http).await
        }
        Commands::Ask { question, backend } => {
            init_stderr_logging();
            ask(&config, backend_http, question, backend).await
        }
        Commands::Upload { files } => {
            init_stderr_logging();
            upload(backend_http, files).await
        }
        Commands::Ingest { backend, no_reset } => {
            init_stderr_logging();
            let backend = backend.unwrap_or_else(|| config.backend());
            let force_reset = !no_reset && config.force_reset();
            ingest(backend_http, backend, force_reset).await
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// The terminal owns stderr while the UI is up, so logs go to a file.
fn init_file_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("unichatbot.log"))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_tui(config: &Config, backend_http: String) -> Result<()> {
    tui::install_panic_hook();

    let (mut app, session_events) = App::new(config, backend_http, Config::config_path().ok())?;
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(session_events);
    app.connect_events(events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn ask(
    config: &Config,
    backend_http: String,
    question: String,
    backend: Option<BackendKind>,
) -> Result<()> {
    let question = question.trim().to_string();
    if question.is_empty() {
        bail!("Question must not be empty");
    }

    let transport = HttpTransport::new(&backend_http)?;
    let backend = backend.unwrap_or_else(|| config.backend());
    let (mut session, mut events) = ChatSession::new(transport, backend);

    session.ask(question);
    session.settle(&mut events).await;

    for message in session.messages().visible() {
        if message.role == ChatRole::Assistant {
            println!("{}", message.content);
        }
    }

    if let Some(sources) = session.sources().filter(|s| !s.is_empty()) {
        let labels: Vec<String> = sources.iter().map(|s| s.label()).collect();
        println!("\nSources: {}", labels.join(", "));
    }

    session.teardown();
    Ok(())
}

async fn upload(backend_http: String, files: Vec<PathBuf>) -> Result<()> {
    let mut selection = FileSelection::new();
    for file in files {
        if let Err(e) = selection.add(file) {
            bail!("{}", e);
        }
    }

    let uploader = Uploader::new(HttpTransport::new(&backend_http)?);
    println!("{}", unichatbot_core::upload::UPLOADING_MESSAGE);
    let report = uploader.upload(&mut selection).await;
    if !report.succeeded() {
        bail!("{}", report.status);
    }
    println!("{}", report.status);
    Ok(())
}

async fn ingest(backend_http: String, backend: BackendKind, force_reset: bool) -> Result<()> {
    let ingestor = Ingestor::new(HttpTransport::new(&backend_http)?);
    println!("{}", unichatbot_core::ingest::INGESTING_MESSAGE);
    println!("{}", ingestor.ingest(backend, force_reset).await);
    Ok(())
}
