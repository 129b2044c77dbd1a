use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod events;
mod fonts;
mod llm;
mod tui;
mod ui;

use app::App;
use config::Config;
use events::Sender;
use fonts::FontLoader;
use llm::LlmClient;
use ui::conversation::ConversationManager;

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(version)]
#[command(about = "Chat with Gemini from your terminal", long_about = None)]
struct Cli {
    /// Path to config.toml (default: ~/.gemchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat screen (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(config).await,
        Commands::Ask { prompt } => run_ask(config, prompt.join(" ")).await,
        Commands::Config { action } => run_config(config, cli.config, action),
    }
}

/// Logs go to a file while the TUI owns the terminal
fn init_file_tracing(config: &Config) -> Result<()> {
    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run_chat(config: Config) -> Result<()> {
    init_file_tracing(&config)?;
    info!(model = %config.model, "starting chat");

    let fonts = FontLoader::new(&config.assets_dir).spawn();
    let client = LlmClient::new(config.clone())?;
    let manager = ConversationManager::new(Arc::new(client), config.fade_in());
    let mut app = App::new(config, manager, fonts);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = app.run(&mut terminal).await;
    tui::restore()?;

    result
}

async fn run_ask(config: Config, prompt: String) -> Result<()> {
    init_stderr_tracing();

    if !config.has_api_key() {
        anyhow::bail!("No API key configured. Set `api_key` in config.toml or the GEMINI_API_KEY variable.");
    }

    let client = LlmClient::new(config.clone())?;
    let mut manager = ConversationManager::new(Arc::new(client), config.fade_in());
    if !manager.submit(&prompt) {
        anyhow::bail!("Nothing to send");
    }

    let interrupted = tokio::select! {
        _ = manager.wait_for_turn() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        manager.cancel();
    }

    if let Some(reply) = manager.messages().last().filter(|m| m.sender == Sender::Ai) {
        println!("{}", reply.text);
    }
    Ok(())
}

fn run_config(config: Config, path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!("Config already exists at {} (use --force to overwrite)", path.display());
                return Ok(());
            }
            config.save(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => {
            println!("config file:  {}", path.display());
            println!("model:        {}", config.model);
            println!("base url:     {}", config.base_url);
            println!("api key:      {}", config.masked_api_key());
            println!("timeout:      {}s", config.request_timeout_secs);
            println!("fonts:        {}", config.assets_dir.display());
            println!("log file:     {}", config.log_path().display());
        }
    }
    Ok(())
}
