use chrono::{DateTime, Utc};

use super::{description, game, registry, vote};
use crate::catalog::CardCatalog;
use crate::error::GameError;
use crate::types::*;

/// Who asked for a phase advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The named player pressed the button; must be the host
    Host(String),
    /// A phase timer for `round` ran out
    Timer { round: u32 },
}

/// A single intended change to a room.
///
/// Deltas are applied to a freshly read room on every commit attempt, never
/// to a cached copy, so a retried write always carries the latest state.
#[derive(Debug, Clone)]
pub enum RoomDelta {
    AddPlayer(Player),
    StartGame { caller: String },
    AddDescription(Description),
    OpenVoting(Trigger),
    CastVote(CastVote),
    Tally(Trigger),
}

/// Everything a delta may read besides the room itself
pub struct DeltaContext<'a> {
    pub catalog: &'a CardCatalog,
    pub config: &'a GameConfig,
    pub now: DateTime<Utc>,
}

impl RoomDelta {
    pub fn name(&self) -> &'static str {
        match self {
            RoomDelta::AddPlayer(_) => "join",
            RoomDelta::StartGame { .. } => "start_game",
            RoomDelta::AddDescription(_) => "submit_description",
            RoomDelta::OpenVoting(_) => "advance_to_voting",
            RoomDelta::CastVote(_) => "cast_vote",
            RoomDelta::Tally(_) => "tally",
        }
    }

    /// Apply to `room` in place. On error the room must be discarded.
    pub fn apply(&self, room: &mut Room, ctx: &DeltaContext<'_>) -> Result<(), GameError> {
        match self {
            RoomDelta::AddPlayer(player) => registry::seat_player(room, player.clone()),
            RoomDelta::StartGame { caller } => {
                game::start(room, caller, ctx, &mut rand::rng())
            }
            RoomDelta::AddDescription(d) => description::append(room, d, ctx.config),
            RoomDelta::OpenVoting(trigger) => game::open_voting(room, trigger, ctx),
            RoomDelta::CastVote(v) => vote::record(room, v),
            RoomDelta::Tally(trigger) => game::settle_votes(room, trigger, ctx),
        }
    }
}
