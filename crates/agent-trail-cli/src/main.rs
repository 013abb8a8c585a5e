use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use agent_trail_core::config::Config;
use agent_trail_core::event::RunEvent;
use agent_trail_core::timeline::{RunPhase, Timeline};
use agent_trail_providers::{event_stream, AgentRunClient};

#[derive(Parser)]
#[command(
    name = "agent-trail",
    about = "Chat gateway and reasoning timeline for a hosted agent-run service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Gateway {
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,

        /// Do not serve the embedded chat UI
        #[arg(long)]
        no_ui: bool,
    },

    /// Ask one question and render the reasoning timeline in the terminal
    Ask {
        /// The question to send
        question: String,

        /// Version constraint override for the released app
        #[arg(long)]
        version: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show resolved paths and settings
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Load config
    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::config_dir);

    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Gateway { port, no_ui } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            let (warnings, _) = config.validate();
            for warning in warnings {
                tracing::warn!("{warning}");
            }

            let state = Arc::new(agent_trail_gateway::GatewayState::new(Arc::new(config)));
            agent_trail_gateway::start_gateway(state, port, !no_ui).await?;
        }
        Commands::Ask { question, version } => {
            ask(&config, &question, version.as_deref()).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
        Commands::Status => {
            println!("Agent Trail v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Gateway port: {}", config.gateway_port());
            println!(
                "Upstream app: {}",
                config.upstream().app_id.as_deref().unwrap_or("(not set)")
            );
            let (warnings, _) = config.validate();
            for warning in warnings {
                println!("Warning: {warning}");
            }
        }
    }

    Ok(())
}

/// One-shot run: stream events from the agent-run service and render the
/// timeline as it grows. Ctrl-C aborts cooperatively between reads.
async fn ask(config: &Config, question: &str, version: Option<&str>) -> anyhow::Result<()> {
    let upstream = config.upstream();
    let Some(api_key) = upstream.resolve_api_key() else {
        anyhow::bail!("no upstream API key configured (upstream.api_key / api_key_env)");
    };
    let client = AgentRunClient::from_config(&upstream)?;
    let version = version.unwrap_or(&upstream.version);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tracing::debug!("Sending question to the agent-run service");
    let response = client.start_run(question, version, &api_key).await?;

    let mut phase = RunPhase::Streaming;
    let mut timeline = Timeline::new();
    let mut events = std::pin::pin!(event_stream(response));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                phase = RunPhase::Aborted;
                break;
            }
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        render_event(&event);
                        timeline.apply(&event);
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Stream failed");
                        phase = RunPhase::Failed;
                        break;
                    }
                    None => {
                        phase = RunPhase::Completed;
                        break;
                    }
                }
            }
        }
    }

    // Generations already reduced stay visible whatever ended the run.
    println!();
    match phase {
        RunPhase::Completed => println!("Run complete — {} steps.", timeline.len()),
        RunPhase::Failed => println!(
            "Run failed — partial timeline retained ({} steps).",
            timeline.len()
        ),
        RunPhase::Aborted => println!("Aborted after {} steps.", timeline.len()),
        _ => {}
    }
    for generation in timeline.generations() {
        let mark = if generation.is_completed { "✓" } else { "…" };
        println!("  {mark} {}", generation.label);
    }

    Ok(())
}

fn render_event(event: &RunEvent) {
    match event {
        RunEvent::GenerationStart { label, .. } => {
            println!();
            println!("▶ {label}");
        }
        RunEvent::Chunk { value, .. } => {
            print!("{value}");
            let _ = std::io::stdout().flush();
        }
        RunEvent::GenerationEnd { .. } => {
            println!();
        }
        RunEvent::Outputs(outputs) => {
            println!();
            println!(
                "{}",
                serde_json::to_string_pretty(outputs).unwrap_or_default()
            );
        }
    }
}
