use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opschat_agent::AgentManager;
use opschat_config::Settings;
use opschat_core::{ChatRequest, StreamChunk};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "opschat")]
#[command(about = "Observability chat agent with MCP tool calling", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation with the monitoring stack
    Chat {
        /// Print raw SSE frames instead of rendered text
        #[arg(long, action = clap::ArgAction::SetTrue)]
        raw: bool,

        /// Use the non-streaming endpoint
        #[arg(long, action = clap::ArgAction::SetTrue)]
        plain: bool,
    },

    /// List tools discovered from connected providers
    Tools,

    /// Check tool provider connectivity
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    // Load configuration
    info!("Loading configuration from: {:?}", cli.config);
    let settings = Settings::from_yaml(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    // Connect the completion backend and tool providers
    let manager = AgentManager::new(&settings).await?;

    match cli.command {
        Commands::Chat { raw, plain } => {
            interactive_chat(manager, raw, plain).await?;
        }
        Commands::Tools => {
            list_tools(&manager);
        }
        Commands::Health => {
            report_health(&manager).await;
        }
    }

    Ok(())
}

async fn interactive_chat(manager: AgentManager, raw: bool, plain: bool) -> Result<()> {
    let session_id = Uuid::new_v4().to_string();

    println!("🤖 OpsChat Interactive Session");
    println!("Type 'exit' or 'quit' to end the conversation");
    println!("Type 'tools' to see available tools, 'clear' to reset the session");
    println!("═══════════════════════════════════════\n");

    loop {
        print!("You> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            println!("Goodbye!");
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("tools") {
            list_tools(&manager);
            continue;
        }

        if input.eq_ignore_ascii_case("clear") {
            manager.clear_session(&session_id);
            println!("🧹 Session history cleared\n");
            continue;
        }

        let request = ChatRequest {
            message: input.to_string(),
            session_id: session_id.clone(),
            dashboard_context: None,
        };

        if plain {
            let response = manager.chat(request).await?;
            println!("\nAssistant> {}\n", response.response);
        } else {
            print!("\nAssistant> ");
            io::stdout().flush()?;
            stream_turn(&manager, request, raw).await?;
            println!("\n");
        }
    }

    Ok(())
}

/// Drains one streaming turn to stdout. Ctrl-C cancels the in-flight
/// turn; the partial text is already in session memory when the
/// channel closes.
async fn stream_turn(manager: &AgentManager, request: ChatRequest, raw: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut rx = manager.chat_stream(request, cancel.clone()).await?;

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(chunk) = received else { break };
                if raw {
                    print!("{}", chunk.to_sse_frame()?);
                } else {
                    render_chunk(&chunk);
                }
                io::stdout().flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n(cancelled)");
                cancel.cancel();
            }
        }
    }

    Ok(())
}

fn render_chunk(chunk: &StreamChunk) {
    match chunk {
        StreamChunk::Token { message } => print!("{message}"),
        StreamChunk::Tool { tool, .. } => println!("\n🔧 {tool}"),
        StreamChunk::Error { message } => println!("\n⚠️  {message}"),
        StreamChunk::Start | StreamChunk::Complete { .. } | StreamChunk::Done => {}
    }
}

fn list_tools(manager: &AgentManager) {
    println!("\n🛠️  Available Tools:");
    println!("═══════════════════════════════════════");

    for (name, description) in manager.tool_summaries() {
        println!("\n📦 {name}");
        println!("   {description}");
    }
    println!();
}

async fn report_health(manager: &AgentManager) {
    println!("\n🔍 Provider Health");
    println!("═══════════════════════════════════════");

    let mut report: Vec<_> = manager.health().await.into_iter().collect();
    report.sort();
    for (provider, healthy) in report {
        let status = if healthy { "✅ reachable" } else { "❌ unreachable" };
        println!("  {provider}: {status}");
    }
    println!();
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
