mod chat;

use anyhow::{Context, Result};
use biosight_agent::{InsightsSession, Orchestrator, Settlement};
use biosight_core::logging::{self, LoggingConfig};
use biosight_core::{Config, hero_headline, marquee_suggestions};
use biosight_providers::{EndpointFactory, InsightsEndpoint, ScriptedEndpoint};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Biosight - conversational insights over bioscience publication data
#[derive(Parser, Debug)]
#[command(name = "biosight")]
#[command(about = "Ask questions about bioscience publication trends", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to biosight.toml (default: ./biosight.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive conversation
    Chat {
        /// Answer from a scripted responses file instead of the endpoint
        #[arg(long, value_name = "PATH")]
        mock: Option<PathBuf>,
    },
    /// Ask a single question and print the answer
    Ask {
        /// Question to ask
        #[arg(required = true, value_name = "TEXT")]
        text: String,

        /// Answer from a scripted responses file instead of the endpoint
        #[arg(long, value_name = "PATH")]
        mock: Option<PathBuf>,
    },
    /// Show the greeting and suggested prompts
    Suggestions,
    /// Write an example config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from("biosight.toml"));

    if let Commands::Init { force } = cli.command {
        return cmd_init(&config_path, force);
    }

    let config = load_config(&config_path)?;
    let mut logging_config = LoggingConfig::from(config.logging.clone());
    if cli.verbose {
        logging_config = logging_config.with_level("debug");
    }
    let _log_guard = logging::init_logging(Some(logging_config)).context("Failed to initialize logging")?;

    if cli.verbose {
        println!("{} Using config: {}", "Info:".blue().bold(), config_path.display());
        println!("{} Endpoint: {}", "Info:".blue().bold(), config.endpoint.url.cyan());
    }

    match cli.command {
        Commands::Chat { mock } => cmd_chat(config, mock.as_deref()),
        Commands::Ask { text, mock } => cmd_ask(&config, &text, mock.as_deref()).map(|_| ()),
        Commands::Suggestions => {
            cmd_suggestions(&config);
            Ok(())
        }
        Commands::Init { .. } => Ok(()),
    }
}

/// Load config from file, or fall back to defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    } else {
        eprintln!(
            "{} Config not found at {}, using defaults. Run `biosight init` to create one.",
            "Warning:".yellow().bold(),
            path.display()
        );
        Ok(Config::default())
    }
}

/// Write the example config
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite it", path.display());
    }

    std::fs::write(path, Config::example()).context("Failed to create config")?;
    println!(
        "{} Created config at {}. Edit the endpoint url if needed.",
        "Success:".green().bold(),
        path.display()
    );
    Ok(())
}

fn build_endpoint(config: &Config, mock: Option<&Path>) -> Result<Arc<dyn InsightsEndpoint>> {
    match mock {
        Some(path) => {
            let endpoint = ScriptedEndpoint::from_file(path)
                .with_context(|| format!("Failed to load scripted responses from {}", path.display()))?;
            Ok(Arc::new(endpoint))
        }
        None => EndpointFactory::create_from_config(&config.endpoint).context("Failed to create endpoint"),
    }
}

fn build_orchestrator(config: &Config) -> Orchestrator {
    Orchestrator::new().with_privacy(LoggingConfig::from(config.logging.clone()).privacy)
}

/// Run the interactive conversation
fn cmd_chat(config: Config, mock: Option<&Path>) -> Result<()> {
    let endpoint = build_endpoint(&config, mock)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    runtime.block_on(async {
        let session = InsightsSession::spawn(endpoint, build_orchestrator(&config));
        chat::run_chat(&config, session, tokio::io::BufReader::new(tokio::io::stdin())).await
    })
}

/// Ask one question and print the settled assistant message
fn cmd_ask(config: &Config, text: &str, mock: Option<&Path>) -> Result<String> {
    let endpoint = build_endpoint(config, mock)?;
    let mut orchestrator = build_orchestrator(config);

    let Some(request) = orchestrator.submit(text).into_request() else {
        anyhow::bail!("Nothing to ask: the question is empty");
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let outcome = runtime.block_on(endpoint.generate(request.payload, request.cancel_token));

    match orchestrator.settle(request.id, outcome) {
        Settlement::Replied(message) => {
            chat::print_message(&message);
            Ok(message.content().to_string())
        }
        Settlement::Apologized(message) => {
            println!("{} {}", "assistant:".red().bold(), message.content());
            Ok(message.content().to_string())
        }
        Settlement::Discarded => anyhow::bail!("The request was cancelled"),
    }
}

/// Print the greeting and suggested prompts
fn cmd_suggestions(config: &Config) {
    println!("{}", hero_headline(&config.assistant.display_name, &chrono::Local::now()).green().bold());
    for (index, suggestion) in marquee_suggestions(&config.assistant.suggestions).iter().enumerate() {
        println!("  {}. {}", index + 1, suggestion.cyan());
    }

    let extra = config.assistant.suggestions.len().saturating_sub(biosight_core::MARQUEE_LEN);
    if extra > 0 {
        println!("  {}", format!("({} more configured)", extra).dimmed());
    }
}
