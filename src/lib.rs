// Public API for integration tests and potential library usage

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mirror;
pub mod notifier;
pub mod protocol;
pub mod state;
pub mod store;
pub mod timer;
pub mod types;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// All HTTP and WebSocket routes
pub fn build_app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/rooms", get(api::list_rooms).post(api::create_room))
        .route("/api/rooms/{id}", get(api::get_room))
        .route("/api/rooms/{id}/players", post(api::join_room))
        .route("/api/cards", get(api::list_cards));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
