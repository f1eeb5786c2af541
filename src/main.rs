use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vox_gateway::api::{self, ApiState};
use vox_gateway::assistant::Assistant;
use vox_gateway::config::Config;
use vox_gateway::context::{ContextProvider, FileContextProvider};
use vox_gateway::llm::OpenAiChat;
use vox_gateway::stt::SpeechToText;
use vox_gateway::tools::{ProviderRegistry, ToolOrchestrator};

/// voxd - Voice assistant gateway
#[derive(Parser)]
#[command(name = "voxd", version, about)]
struct Cli {
    /// Host to bind
    #[arg(long, env = "VOX_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "VOX_PORT")]
    port: Option<u16>,

    /// Directory of knowledge documents for retrieval augmentation
    #[arg(long, env = "VOX_KNOWLEDGE_DIR")]
    knowledge_dir: Option<std::path::PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,vox_gateway=info",
        1 => "info,vox_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let chat = Arc::new(OpenAiChat::new(
        config.model.api_key.clone(),
        config.model.api_base.clone(),
        config.model.llm_model.clone(),
    )?);
    let transcriber = Arc::new(SpeechToText::new(
        config.model.api_key.clone(),
        config.model.api_base.clone(),
        config.model.stt_model.clone(),
    )?);

    // Provider registry and orchestrator
    let orchestrator = if config.tools.enabled {
        let registry = match &config.tools.registry_path {
            Some(path) => ProviderRegistry::load(path)?,
            None => {
                tracing::warn!("tools enabled but no registry file configured");
                ProviderRegistry::new()
            }
        };
        Arc::new(ToolOrchestrator::from_registry(&config.tools, &registry))
    } else {
        Arc::new(ToolOrchestrator::new(&config.tools))
    };
    orchestrator.start_all_enabled().await;

    // Optional document retrieval
    let context: Option<Arc<dyn ContextProvider>> =
        if cli.knowledge_dir.is_some() || config.use_retrieval {
            let dir = cli
                .knowledge_dir
                .clone()
                .unwrap_or_else(|| std::path::PathBuf::from("data/knowledge"));
            let provider = FileContextProvider::new(dir);
            if let Err(e) = provider.reload().await {
                tracing::warn!(error = %e, "initial knowledge load failed");
            }
            Some(Arc::new(provider))
        } else {
            None
        };

    let assistant = Arc::new(Assistant::new(
        chat,
        transcriber,
        Arc::clone(&orchestrator),
        context,
        config.model.system_prompt.clone(),
    ));

    let state = Arc::new(ApiState {
        config: config.clone(),
        assistant,
        orchestrator: Arc::clone(&orchestrator),
    });

    let host = config.host.clone();
    let port = config.port;
    tokio::select! {
        result = api::serve(state, &host, port) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    orchestrator.shutdown_all().await;
    Ok(())
}
