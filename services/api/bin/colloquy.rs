//! Main Entrypoint for Colloquy
//!
//! `colloquy run <scenario>` plays one scenario while serving the live transcript;
//! `colloquy serve` only serves, and scenarios are started over `POST /run-scenario`.
//!
//! Startup order:
//! 1. Load configuration from the environment and initialise logging.
//! 2. Build the LLM client, start the local MCP tool server and assemble the tool registry.
//! 3. Build the agent runtime, the optional TTS renderer and the scenario runner.
//! 4. Serve the HTTP surface and, for `run`, drive the conversation.

use anyhow::{Context, bail};
use async_openai::config::OpenAIConfig;
use clap::{Parser, Subcommand};
use colloquy_api::{
    config::Config,
    router::create_router,
    runner::{RunSettings, ScenarioRunner},
    state::AppState,
    tts::{AudioCache, GoogleTtsRenderer},
};
use colloquy_core::{
    Scenario,
    llm_client::{LLMClient, OpenAICompatibleClient, RequestOptions},
    runtime::{AgentRuntime, LlmAgentRuntime},
    scenario::resolve_scenario_path,
    tools::{
        ToolRegistry, local::spawn_local_tools, mcp::register_mcp_tools,
        surrogate::SurrogateToolHandler,
    },
    transcript::TranscriptBoard,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Two-agent scenario conversations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario to completion.
    Run {
        /// Scenario file, or a name resolved under SCENARIOS_PATH (`.json` optional).
        scenario: String,
        /// Override MAX_TURNS for this run.
        #[arg(long)]
        max_turns: Option<u32>,
        /// Write the final report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Exit when the conversation ends instead of keeping the transcript served.
        #[arg(long)]
        exit_on_finish: bool,
    },
    /// Serve the UI and API and wait for scenarios.
    Serve,
}

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

fn build_llm_client(config: &Config) -> anyhow::Result<Arc<dyn LLMClient>> {
    let api_key = config
        .provider_api_key()
        .context("No API key configured for the selected provider")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider_api_base());
    let options = RequestOptions {
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: None,
    };
    info!(provider = ?config.provider, model = %config.chat_model, "Using chat provider");
    Ok(Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
        options,
    )))
}

async fn build_runtime(
    config: &Config,
    client: Arc<dyn LLMClient>,
) -> anyhow::Result<(Arc<dyn AgentRuntime>, JoinHandle<()>)> {
    let (mcp_client, tool_server) = spawn_local_tools()
        .await
        .context("Failed to start the local tool server")?;
    let mut registry = ToolRegistry::new();
    let registered = register_mcp_tools(&mut registry, mcp_client).await?;
    registry.set_fallback(Arc::new(SurrogateToolHandler::new(client.clone())));
    info!(registered, "Tool registry ready");

    let runtime = LlmAgentRuntime::new(client, Arc::new(registry), config.max_tool_rounds);
    Ok((Arc::new(runtime), tool_server))
}

fn load_scenario(config: &Config, name: &str) -> anyhow::Result<Scenario> {
    let direct = PathBuf::from(name);
    let path = if direct.is_file() {
        direct
    } else {
        resolve_scenario_path(&config.scenarios_path, name)
    };
    if !path.is_file() {
        bail!("Scenario file {} does not exist", path.display());
    }
    info!(path = %path.display(), "Loading scenario");
    Ok(Scenario::from_path(&path)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing services...");

    // --- 2. Collaborators ---
    let client = build_llm_client(&config)?;
    let (runtime, tool_server) = build_runtime(&config, client).await?;

    let board = Arc::new(TranscriptBoard::new());
    let requested = match &cli.command {
        Command::Run { max_turns, .. } => *max_turns,
        Command::Serve => None,
    };
    let max_turns = config.turn_budget(requested)?;
    let settings = RunSettings {
        max_turns,
        pause_poll_interval: config.pause_poll_interval,
    };
    let mut runner = ScenarioRunner::new(board.clone(), runtime, settings);
    match &config.google_tts_api_key {
        Some(key) => {
            info!(audio_dir = %config.audio_dir.display(), "Text-to-speech enabled");
            let cache = AudioCache::new(config.audio_dir.clone());
            runner = runner.with_speech(Arc::new(GoogleTtsRenderer::new(key.clone(), cache)));
        }
        None => info!("GOOGLE_TTS_API_KEY not set; running without audio"),
    }
    let runner = Arc::new(runner);

    // --- 3. HTTP surface ---
    tokio::fs::create_dir_all(&config.audio_dir).await?;
    let app_state = Arc::new(AppState {
        board,
        runner: runner.clone(),
        audio_dir: config.audio_dir.clone(),
    });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(app_state).layer(cors);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!(bind_address = %config.bind_address, "Serving transcript at http://{}", config.bind_address);

    match cli.command {
        Command::Serve => {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
        Command::Run {
            scenario,
            report,
            exit_on_finish,
            ..
        } => {
            let server = tokio::spawn(async move {
                axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(shutdown_signal())
                .await
            });

            let scenario = load_scenario(&config, &scenario)?;
            let result = runner.run_to_completion(scenario).await;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    server.abort();
                    tool_server.abort();
                    return Err(e).context("Scenario run failed");
                }
            };
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&outcome)?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                info!(path = %path.display(), "Report written");
            }

            if exit_on_finish {
                server.abort();
            } else {
                info!("Conversation finished. Transcript still served; press Ctrl+C to exit.");
                if let Err(e) = server.await? {
                    warn!(error = %e, "Server stopped with an error");
                }
            }
        }
    }

    tool_server.abort();
    info!("Shut down.");
    Ok(())
}
