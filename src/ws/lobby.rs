//! Lobby message handlers
//!
//! Listing, creating and joining rooms. A successful create or join seats
//! the connection in that room.

use crate::protocol::{Seat, ServerMessage};
use crate::state::AppState;
use crate::types::RoomSummary;

use super::Connection;

pub async fn handle_list_rooms(state: &AppState) -> Option<ServerMessage> {
    match state.list_waiting_rooms().await {
        Ok(rooms) => Some(ServerMessage::Rooms {
            rooms: rooms.iter().map(RoomSummary::from).collect(),
        }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_create_room(
    state: &AppState,
    conn: &mut Connection,
    name: String,
    host_name: String,
) -> Option<ServerMessage> {
    match state.create_room(&name, &host_name).await {
        Ok(room) => Some(seat(conn, room.host.clone(), room)),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_join_room(
    state: &AppState,
    conn: &mut Connection,
    room_id: String,
    player_name: String,
) -> Option<ServerMessage> {
    match state.join_room(&room_id, &player_name).await {
        Ok(room) => Some(seat(conn, player_name.trim().to_string(), room)),
        Err(e) => Some(e.into()),
    }
}

fn seat(conn: &mut Connection, player_name: String, room: crate::types::Room) -> ServerMessage {
    let seat = Seat {
        room_id: room.id.clone(),
        player_name,
    };
    let view = room.view_for(Some(&seat.player_name));
    conn.sit(seat.clone(), room);
    ServerMessage::Seated { seat, room: view }
}
