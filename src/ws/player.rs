//! Player message handlers

use crate::error::GameError;
use crate::protocol::{Seat, ServerMessage};
use crate::state::AppState;
use crate::types::VoteTarget;

use super::{lobby, Connection};

pub async fn handle_reveal_card(state: &AppState, seat: &Seat) -> Option<ServerMessage> {
    let room = match state.get_room(&seat.room_id).await {
        Ok(room) => room,
        Err(e) => return Some(e.into()),
    };
    let card = room
        .game_state
        .as_ref()
        .and_then(|gs| gs.card_for(&seat.player_name));

    match card {
        Some(pc) => Some(ServerMessage::YourCard {
            card: pc.card.clone(),
            is_imposter: pc.is_imposter,
        }),
        None => Some(
            GameError::Precondition("No card dealt to you yet".to_string()).into(),
        ),
    }
}

pub async fn handle_submit_description(
    state: &AppState,
    seat: &Seat,
    round: u32,
    text: String,
) -> Option<ServerMessage> {
    match state
        .submit_description(&seat.room_id, &seat.player_name, round, &text)
        .await
    {
        Ok(_) => Some(ServerMessage::DescriptionAccepted { round }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_cast_vote(
    state: &AppState,
    seat: &Seat,
    target: VoteTarget,
) -> Option<ServerMessage> {
    match state
        .cast_vote(&seat.room_id, &seat.player_name, target.clone())
        .await
    {
        Ok(_) => Some(ServerMessage::VoteAccepted { target }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_reset_room(
    state: &AppState,
    conn: &mut Connection,
    seat: &Seat,
) -> Option<ServerMessage> {
    match state.reset_room(&seat.room_id, &seat.player_name).await {
        Ok(_) => {
            conn.leave();
            lobby::handle_list_rooms(state).await
        }
        Err(e) => Some(e.into()),
    }
}
