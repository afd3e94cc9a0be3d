//! murmur - minimal streaming chat client for the terminal

mod config;

use std::io::Write as _;

use anyhow::Context as _;
use clap::Parser;
use murmur_client::{Engine, EngineConfig, EngineEvent};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;

/// murmur - talk to a remote chat service, one streamed exchange at a time
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bearer token for the chat service (overrides config file and MURMUR_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    /// Model identifier to request
    #[arg(short, long)]
    model: Option<String>,

    /// Conversation endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("murmur_client=debug,murmur=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
            }
            Err(e) => {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let token = config::resolve_token(
        args.token,
        cfg.token.clone(),
        std::env::var("MURMUR_TOKEN").ok(),
    )
    .context("no credential found: pass --token, set MURMUR_TOKEN, or run --init-config")?;

    // Merge config with CLI args (CLI takes precedence)
    let mut engine_config = EngineConfig::new(token);
    if let Some(model) = args.model.or(cfg.model) {
        engine_config = engine_config.with_model(model);
    }
    if let Some(endpoint) = args.endpoint.or(cfg.endpoint) {
        engine_config = engine_config.with_endpoint(endpoint);
    }

    let mut engine = Engine::new(engine_config);
    let mut events = engine.subscribe();

    println!("murmur - type a message and press enter. /reset starts over, /quit exits.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                engine.reset_conversation()?;
                println!("conversation reset");
            }
            text => run_exchange(&mut engine, &mut events, text).await?,
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

/// Drive one send while rendering engine events as they arrive.
///
/// Transport failures are reported and the loop keeps going; the turn stays
/// in history without a reply. Invariant violations are defects and bubble
/// out of main.
async fn run_exchange(
    engine: &mut Engine,
    events: &mut broadcast::Receiver<EngineEvent>,
    text: &str,
) -> anyhow::Result<()> {
    let mut renderer = Renderer::default();

    let send = engine.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            event = events.recv() => {
                if let Ok(event) = event {
                    renderer.render(&event);
                }
            }
        }
    };

    // The send future resolved before we drained everything it broadcast.
    while let Ok(event) = events.try_recv() {
        renderer.render(&event);
    }

    match result {
        Ok(_turn_id) => Ok(()),
        Err(e) if e.is_transport() => {
            eprintln!("\nnetwork failure: {e} (message kept in history without a reply)");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Incremental printer for the assistant's growing reply snapshot.
#[derive(Default)]
struct Renderer {
    last: String,
    waiting: bool,
}

impl Renderer {
    fn render(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::ExchangeStart { .. } => {
                self.last.clear();
                // Busy indicator until the first snapshot arrives, so a
                // slow connection doesn't look hung.
                self.waiting = true;
                print!("…");
                let _ = std::io::stdout().flush();
            }
            EngineEvent::TurnUpdated { text, .. } => {
                if self.waiting {
                    self.waiting = false;
                    print!("\r");
                }
                print!("{}", unseen_suffix(&self.last, text));
                let _ = std::io::stdout().flush();
                self.last = text.clone();
            }
            EngineEvent::AuthExpired => {
                eprintln!(
                    "\ncredential expired: update the token in {} or MURMUR_TOKEN",
                    config::Config::config_path().display()
                );
            }
            EngineEvent::RemoteFailure { message } => {
                eprintln!("\nservice error: {message}");
            }
            EngineEvent::ExchangeEnd { .. } => {
                println!();
            }
        }
    }
}

/// What to print for a new snapshot: the wire sends growing snapshots, so
/// normally just the unseen tail. A snapshot that doesn't extend the last
/// one is reprinted whole on its own line.
fn unseen_suffix(last: &str, text: &str) -> String {
    match text.strip_prefix(last) {
        Some(suffix) => suffix.to_string(),
        None => format!("\n{text}"),
    }
}
