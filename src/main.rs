use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use appfab::config::{Cli, Config};
use appfab::gateway::OpenAiGateway;
use appfab::state::AppState;
use appfab::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // Generation credential is read once; absence only disables real generation
    let api_key = config.generation.api_key_from_env();
    if api_key.is_none() {
        if config.generation.demo_fallback {
            tracing::warn!(
                "{} not set, generation will serve the demo app",
                config.generation.api_key_env
            );
        } else {
            tracing::warn!(
                "{} not set, generation requires a per-request API key",
                config.generation.api_key_env
            );
        }
    }
    let gateway = OpenAiGateway::new(&config.generation, api_key)?;

    let state = AppState {
        db: pool,
        config: config.clone(),
        generator: Arc::new(gateway),
    };

    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
