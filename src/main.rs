mod agent;
mod config;
mod llm;
mod sandbox;
mod tools;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::agent::AgentRuntime;
use crate::config::Config;
use crate::llm::{AnthropicClient, LlmClient};
use crate::sandbox::PathGuard;
use crate::tools::ToolDispatcher;

fn print_help() {
    println!(
        "\
patchbox v{}

A minimal sandboxed coding agent: an LLM drives bounded file and shell
tools inside a single directory.

USAGE:
    patchbox [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/agent.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG              Log level filter for tracing
                          (e.g. debug, patchbox=debug,warn)
    ANTHROPIC_API_KEY     API key for Anthropic Claude models
                          (from https://console.anthropic.com/)

EXAMPLES:
    patchbox                          # uses config/agent.toml
    patchbox /etc/patchbox/agent.toml # custom config path
    RUST_LOG=debug patchbox           # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("patchbox v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("patchbox=warn")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    let root = config.sandbox.resolve_root()?;
    let guard = PathGuard::new(&root)?;
    let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::new(config.llm.clone()));

    info!("LLM: {}", llm.description());
    info!("Sandbox root: {}", guard.root().display());
    info!(
        "Limits: {} turns, {}s command timeout",
        config.limits.max_turns, config.limits.command_timeout_secs
    );

    let sandbox_root = guard.root().display().to_string();
    let dispatcher = ToolDispatcher::new(
        guard,
        Duration::from_secs(config.limits.command_timeout_secs),
    );
    let mut runtime = AgentRuntime::new(llm, dispatcher, config.limits.clone(), &sandbox_root);

    println!("patchbox v{} — sandbox: {sandbox_root}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or 'quit' to leave.\n");

    // ── Console loop ───────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let mut print_delta = |delta: &str| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        };

        // A model-transport failure ends this turn only; the
        // conversation and the read loop survive.
        match runtime.handle_input(input, &mut print_delta).await {
            Ok(_) => println!(),
            Err(e) => {
                error!("Turn failed: {e}");
                eprintln!("\nError: {e}");
            }
        }
    }

    info!("Bye");
    Ok(())
}
