use crate::error::GameError;
use crate::store::ChangeOperation;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    ListRooms,
    CreateRoom {
        name: String,
        host_name: String,
    },
    JoinRoom {
        room_id: RoomId,
        player_name: String,
    },
    /// Leave the current room view (does not remove the player)
    ReturnToLobby,
    /// Ask for this player's own card
    RevealCard,
    SubmitDescription {
        round: u32,
        text: String,
    },
    /// Player name or "continue"
    CastVote {
        target: VoteTarget,
    },
    /// Delete the finished room
    ResetRoom,
    // Host-only messages
    StartGame,
    AdvanceToVoting,
    FinishVoting,
}

/// The room and player name a connection acts as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub room_id: RoomId,
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: DateTime<Utc>,
        /// Restored seat when reconnecting with room and name
        seat: Option<Seat>,
    },
    Rooms {
        rooms: Vec<RoomSummary>,
    },
    /// Connection is now seated in a room
    Seated {
        seat: Seat,
        room: Room,
    },
    /// Full room snapshot after a change
    RoomUpdate {
        phase: Phase,
        room: Room,
    },
    /// Lobby view: a room was created, changed or removed
    LobbyChange {
        operation: ChangeOperation,
        room: RoomSummary,
    },
    RoomClosed {
        room_id: RoomId,
    },
    Phase {
        room_id: RoomId,
        phase: Phase,
        deadline: Option<DateTime<Utc>>,
        server_now: DateTime<Utc>,
        result: Option<GameResult>,
    },
    YourCard {
        /// None for the imposter
        card: Option<Card>,
        is_imposter: bool,
    },
    DescriptionAccepted {
        round: u32,
    },
    VoteAccepted {
        target: VoteTarget,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// Phase announcement for a room, with the deadline clients count down to
    pub fn phase_of(room: &Room) -> Self {
        let gs = room.game_state.as_ref();
        ServerMessage::Phase {
            room_id: room.id.clone(),
            phase: room.phase(),
            deadline: gs.and_then(|gs| gs.phase_deadline),
            server_now: Utc::now(),
            result: gs.and_then(|gs| gs.result.clone()),
        }
    }

    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::error(err.code(), err.to_string())
    }
}
