//! Binary entrypoint for the supergraph HTTP server.
//!
//! See [`esg_server::config`] for the environment variables it reads.
//! Log verbosity follows `RUST_LOG` (default: info).

use tracing_subscriber::EnvFilter;

use esg_server::config::ServerConfig;
use esg_server::router::build_router;
use esg_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::new(&config.db_path)?;
    let app = build_router(state);

    let addr = config.addr();
    tracing::info!(db = %config.db_path, "esg server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
