use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colloquy_api::{build_router, config::Config, state::AppState};
use colloquy_llm::{ChatClient, OpenAIClient};
use colloquy_memory::ContextStore;
use colloquy_relay::{PriceTable, RelaySession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting colloquy relay server");
    tracing::info!("Default model: {}", config.llm.model);

    let chat_client: Arc<dyn ChatClient> =
        Arc::new(OpenAIClient::new(config.openai_api_key.clone())?);

    let store = Arc::new(ContextStore::new());
    let relay = Arc::new(RelaySession::new(
        chat_client,
        store,
        PriceTable::default(),
    ));

    let state = Arc::new(AppState::new(config.clone(), relay));

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
