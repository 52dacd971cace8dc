use super::{AppState, RoomDelta};
use crate::error::GameError;
use crate::types::*;

/// Descriptions written for `round`, in submission order. Cheap to clone and
/// iterate again.
pub fn for_round(
    descriptions: &[Description],
    round: u32,
) -> impl Iterator<Item = &Description> + Clone + '_ {
    descriptions.iter().filter(move |d| d.round == round)
}

/// True once every player has described `round`
pub fn round_complete(descriptions: &[Description], round: u32, player_count: usize) -> bool {
    for_round(descriptions, round).count() >= player_count
}

pub(super) fn append(
    room: &mut Room,
    submitted: &Description,
    config: &GameConfig,
) -> Result<(), GameError> {
    let text = submitted.text.trim();
    if text.is_empty() {
        return Err(GameError::Validation("Description cannot be empty".to_string()));
    }
    if text.chars().count() > config.max_description_chars {
        return Err(GameError::Validation(format!(
            "Description is longer than {} characters",
            config.max_description_chars
        )));
    }

    let current = match room.phase() {
        Phase::Describing(r) => r,
        other => {
            return Err(GameError::Precondition(format!(
                "Descriptions are closed ({:?})",
                other
            )))
        }
    };
    if submitted.round != current {
        return Err(GameError::Precondition(format!(
            "Round {} is not open for descriptions (current round is {})",
            submitted.round, current
        )));
    }
    if room.player(&submitted.player).is_none() {
        return Err(GameError::Precondition(format!(
            "{} is not a player in this room",
            submitted.player
        )));
    }

    let Some(gs) = room.game_state.as_mut() else {
        return Err(GameError::Precondition("Game has not started".to_string()));
    };
    if for_round(&gs.descriptions, current).any(|d| d.player == submitted.player) {
        return Err(GameError::DuplicateSubmission(format!(
            "{} already described round {}",
            submitted.player, current
        )));
    }

    gs.descriptions.push(Description {
        player: submitted.player.clone(),
        round: current,
        text: text.to_string(),
    });
    Ok(())
}

impl AppState {
    pub async fn submit_description(
        &self,
        room_id: &str,
        player: &str,
        round: u32,
        text: &str,
    ) -> Result<Room, GameError> {
        let delta = RoomDelta::AddDescription(Description {
            player: player.to_string(),
            round,
            text: text.to_string(),
        });
        let room = self.commit(room_id, delta).await?;

        if let Some(gs) = &room.game_state {
            tracing::info!(
                "{} described round {} in room {} ({}/{})",
                player,
                round,
                room_id,
                for_round(&gs.descriptions, round).count(),
                room.players.len()
            );
        }
        Ok(room)
    }

    pub async fn descriptions_for_round(
        &self,
        room_id: &str,
        round: u32,
    ) -> Result<Vec<Description>, GameError> {
        let room = self.get_room(room_id).await?;
        Ok(room
            .game_state
            .map(|gs| for_round(&gs.descriptions, round).cloned().collect())
            .unwrap_or_default())
    }
}
