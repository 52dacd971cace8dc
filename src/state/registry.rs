use super::{AppState, RoomDelta};
use crate::error::GameError;
use crate::store::with_backoff;
use crate::types::*;

fn required(raw: &str, what: &str) -> Result<String, GameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::Validation(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}

/// Player names double as vote targets, so the continue sentinel is taken
fn player_name(raw: &str) -> Result<String, GameError> {
    let name = required(raw, "Player name")?;
    if name.eq_ignore_ascii_case(CONTINUE_VOTE) {
        return Err(GameError::Validation(format!(
            "'{}' is reserved and cannot be used as a name",
            name
        )));
    }
    Ok(name)
}

pub(super) fn seat_player(room: &mut Room, player: Player) -> Result<(), GameError> {
    if room.player(&player.name).is_some() {
        return Err(GameError::Conflict(format!(
            "Name '{}' is already taken in this room",
            player.name
        )));
    }
    if room.status != RoomStatus::Waiting {
        return Err(GameError::Precondition(
            "Game already started, joining is closed".to_string(),
        ));
    }
    room.players.push(player);
    Ok(())
}

impl AppState {
    /// Create a room hosted (and joined) by `host_name`
    pub async fn create_room(&self, name: &str, host_name: &str) -> Result<Room, GameError> {
        let name = required(name, "Room name")?;
        let host_name = player_name(host_name)?;

        let room = Room {
            id: ulid::Ulid::new().to_string(),
            name,
            host: host_name.clone(),
            players: vec![Player {
                id: ulid::Ulid::new().to_string(),
                name: host_name,
            }],
            status: RoomStatus::Waiting,
            game_state: None,
            created_at: chrono::Utc::now(),
            version: 0,
        };

        let room = with_backoff(&self.retry, "insert", || self.store.insert(room.clone())).await?;
        tracing::info!("Created room {} ({}) hosted by {}", room.id, room.name, room.host);
        Ok(room)
    }

    /// Every room in the store
    pub async fn all_rooms(&self) -> Result<Vec<Room>, GameError> {
        Ok(with_backoff(&self.retry, "list", || self.store.list()).await?)
    }

    /// Rooms still accepting players, newest first
    pub async fn list_waiting_rooms(&self) -> Result<Vec<Room>, GameError> {
        let mut rooms: Vec<Room> = self
            .all_rooms()
            .await?
            .into_iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    pub async fn join_room(&self, room_id: &str, player_name_raw: &str) -> Result<Room, GameError> {
        let name = player_name(player_name_raw)?;
        let player = Player {
            id: ulid::Ulid::new().to_string(),
            name: name.clone(),
        };

        let room = self.commit(room_id, RoomDelta::AddPlayer(player)).await?;
        tracing::info!(
            "{} joined room {} ({} players)",
            name,
            room_id,
            room.players.len()
        );
        Ok(room)
    }

    /// Delete a finished room. Any of its players may do this.
    pub async fn reset_room(&self, room_id: &str, caller: &str) -> Result<Room, GameError> {
        let room = self.get_room(room_id).await?;
        if room.player(caller).is_none() {
            return Err(GameError::Precondition(format!(
                "{} is not a player in this room",
                caller
            )));
        }
        if room.status != RoomStatus::Finished {
            return Err(GameError::Precondition(
                "Only finished games can be reset".to_string(),
            ));
        }

        let removed = with_backoff(&self.retry, "delete", || self.store.delete(room_id)).await?;
        tracing::info!("Room {} reset by {}", room_id, caller);
        Ok(removed)
    }
}
