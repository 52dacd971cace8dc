//! WebSocket message dispatch
//!
//! Lobby messages work on any connection. Everything else needs a seat,
//! which is checked here before dispatching to the lobby, player or host
//! handler modules. Host rights are enforced by the state layer.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{host, lobby, player, Connection};

/// Macro to fetch the connection's seat and return early if it has none
macro_rules! require_seat {
    ($conn:expr, $action:expr) => {
        match $conn.seat.clone() {
            Some(seat) => seat,
            None => {
                return Some(ServerMessage::error(
                    "NOT_SEATED",
                    format!("Join a room before trying to {}", $action),
                ))
            }
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let response = match msg {
        // Lobby messages
        ClientMessage::ListRooms => lobby::handle_list_rooms(state).await,

        ClientMessage::CreateRoom { name, host_name } => {
            lobby::handle_create_room(state, conn, name, host_name).await
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => lobby::handle_join_room(state, conn, room_id, player_name).await,

        ClientMessage::ReturnToLobby => {
            conn.leave();
            lobby::handle_list_rooms(state).await
        }

        // Player messages
        ClientMessage::RevealCard => {
            let seat = require_seat!(conn, "see a card");
            player::handle_reveal_card(state, &seat).await
        }

        ClientMessage::SubmitDescription { round, text } => {
            let seat = require_seat!(conn, "describe");
            player::handle_submit_description(state, &seat, round, text).await
        }

        ClientMessage::CastVote { target } => {
            let seat = require_seat!(conn, "vote");
            player::handle_cast_vote(state, &seat, target).await
        }

        ClientMessage::ResetRoom => {
            let seat = require_seat!(conn, "reset a room");
            player::handle_reset_room(state, conn, &seat).await
        }

        // Host commands
        ClientMessage::StartGame => {
            let seat = require_seat!(conn, "start a game");
            host::handle_start_game(state, &seat).await
        }

        ClientMessage::AdvanceToVoting => {
            let seat = require_seat!(conn, "open voting");
            host::handle_advance_to_voting(state, &seat).await
        }

        ClientMessage::FinishVoting => {
            let seat = require_seat!(conn, "finish voting");
            host::handle_finish_voting(state, &seat).await
        }
    };

    // A vanished room ends the session; the client goes back to the lobby
    if let Some(ServerMessage::Error { code, .. }) = &response {
        if code == "NOT_FOUND" && conn.seat.is_some() {
            tracing::info!("Room for seat {:?} is gone, returning to lobby", conn.seat);
            conn.leave();
        }
    }

    response
}
