use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use useradmin::nlp::llm::{OpenAiClient, OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECONDS};
use useradmin::{Gateway, GatewayConfig, LlmProvider, SqliteUserStore, UserStore};

#[derive(Parser)]
#[command(name = "useradmin-gateway")]
#[command(version)]
#[command(about = "User administration gateway with natural-language CRUD")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_addr: String,

    #[arg(long, default_value = "storage/users.db")]
    db_path: PathBuf,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    /// Default model; a request may override it, and a hardcoded fallback
    /// applies when this is blank.
    #[arg(long, default_value = "")]
    openai_model: String,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    openai_timeout_seconds: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("gateway failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(parent) = cli.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = SqliteUserStore::new(&cli.db_path)?;
    info!(db_path = %store.path().display(), "user store opened");
    let store: Arc<dyn UserStore> = Arc::new(store);
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiClient::new(OpenAiConfig {
        api_key: cli.openai_api_key,
        base_url: cli.openai_base_url,
        model: cli.openai_model,
        timeout_seconds: cli.openai_timeout_seconds,
    })?);

    Gateway::start(
        GatewayConfig {
            bind_addr: cli.bind_addr,
        },
        store,
        provider,
    )
    .await
}
