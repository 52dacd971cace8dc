//! HTTP API endpoints.
//!
//! Read access to the lobby plus room creation and joining for clients that
//! are not (yet) on a WebSocket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GameError;
use crate::state::AppState;
use crate::types::{Card, Room, RoomSummary};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub host_name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub player_name: String,
}

/// GET /api/rooms
///
/// Rooms waiting for players, newest first.
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomSummary>>, GameError> {
    let rooms = state.list_waiting_rooms().await?;
    Ok(Json(rooms.iter().map(RoomSummary::from).collect()))
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), GameError> {
    let room = state.create_room(&req.name, &req.host_name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/rooms/{id}
///
/// Outsider view: no player cards while a game is running.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, GameError> {
    let room = state.get_room(&room_id).await?;
    Ok(Json(room.view_for(None)))
}

/// POST /api/rooms/{id}/players
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<Room>, GameError> {
    Ok(Json(state.join_room(&room_id, &req.player_name).await?))
}

/// GET /api/cards
pub async fn list_cards(State(state): State<Arc<AppState>>) -> Json<Vec<Card>> {
    Json(state.catalog.cards().to_vec())
}
