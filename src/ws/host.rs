//! Host message handlers
//!
//! Phase changes the host drives by hand. The new phase reaches every
//! client through the change feed; the caller gets it back immediately.

use crate::protocol::{Seat, ServerMessage};
use crate::state::{AppState, Trigger};

fn as_host(seat: &Seat) -> Trigger {
    Trigger::Host(seat.player_name.clone())
}

pub async fn handle_start_game(state: &AppState, seat: &Seat) -> Option<ServerMessage> {
    tracing::info!("{} starts the game in room {}", seat.player_name, seat.room_id);
    match state.start_game(&seat.room_id, &seat.player_name).await {
        Ok(room) => Some(ServerMessage::phase_of(&room)),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_advance_to_voting(state: &AppState, seat: &Seat) -> Option<ServerMessage> {
    match state.advance_to_voting(&seat.room_id, as_host(seat)).await {
        Ok(room) => Some(ServerMessage::phase_of(&room)),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_finish_voting(state: &AppState, seat: &Seat) -> Option<ServerMessage> {
    match state.tally_and_advance(&seat.room_id, as_host(seat)).await {
        Ok(room) => Some(ServerMessage::phase_of(&room)),
        Err(e) => Some(e.into()),
    }
}
