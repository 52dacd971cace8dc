use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imposter::{build_app, config::ServerConfig, state::AppState, store::InMemoryRoomStore, timer};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imposter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Imposter...");

    let config = ServerConfig::from_env();

    let catalog = match config.load_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::from_parts(
        Arc::new(InMemoryRoomStore::new()),
        catalog,
        config.game.clone(),
        config.retry.clone(),
    ));

    // Background task that arms and fires phase timers for every room
    timer::spawn_phase_timers(state.clone());

    let app = build_app(state);

    tracing::info!("Listening on http://{}", config.listen_addr);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
