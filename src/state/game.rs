use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::{assignment, description, vote, AppState, DeltaContext, Outcome, RoomDelta, Trigger};
use crate::error::GameError;
use crate::types::*;

/// Fewest players a game can start with
pub const MIN_PLAYERS: usize = 3;

/// Check if a phase transition is valid
pub fn is_valid_transition(from: &Phase, to: &Phase) -> bool {
    use Phase::*;

    match (from, to) {
        (Waiting, Describing(1)) => true,
        (Describing(r), Voting(v)) => r == v,
        // Continue majority
        (Voting(r), Describing(next)) => *next == r + 1,
        // Eviction
        (Voting(_), Finished) => true,
        _ => false,
    }
}

fn deadline_after(now: DateTime<Utc>, seconds: u32) -> Option<DateTime<Utc>> {
    Some(now + Duration::seconds(i64::from(seconds)))
}

/// Hosts may always trigger; a timer only for the round it was armed for
fn check_trigger(room: &Room, trigger: &Trigger, round: u32, action: &str) -> Result<(), GameError> {
    match trigger {
        Trigger::Host(caller) if !room.is_host(caller) => Err(GameError::Precondition(format!(
            "Only the host can {}",
            action
        ))),
        Trigger::Host(_) => Ok(()),
        Trigger::Timer { round: armed } if *armed != round => {
            Err(GameError::Precondition(format!(
                "Timer for round {} expired after the room moved on to round {}",
                armed, round
            )))
        }
        Trigger::Timer { .. } => Ok(()),
    }
}

pub(super) fn start<R: Rng>(
    room: &mut Room,
    caller: &str,
    ctx: &DeltaContext<'_>,
    rng: &mut R,
) -> Result<(), GameError> {
    if room.status != RoomStatus::Waiting {
        return Err(GameError::Precondition("Game already started".to_string()));
    }
    if !room.is_host(caller) {
        return Err(GameError::Precondition(
            "Only the host can start the game".to_string(),
        ));
    }
    if room.players.len() < MIN_PLAYERS {
        return Err(GameError::Precondition(format!(
            "Need at least {} players to start (have {})",
            MIN_PLAYERS,
            room.players.len()
        )));
    }

    let mut gs = assignment::assign(&room.players, ctx.catalog, rng)?;
    gs.phase_deadline = deadline_after(ctx.now, ctx.config.describe_seconds);
    room.game_state = Some(gs);
    room.status = RoomStatus::Playing;
    Ok(())
}

pub(super) fn open_voting(
    room: &mut Room,
    trigger: &Trigger,
    ctx: &DeltaContext<'_>,
) -> Result<(), GameError> {
    let round = match room.phase() {
        Phase::Describing(r) => r,
        other => {
            return Err(GameError::Precondition(format!(
                "Cannot open voting from {:?}",
                other
            )))
        }
    };
    check_trigger(room, trigger, round, "open voting")?;

    let Some(gs) = room.game_state.as_mut() else {
        return Err(GameError::Precondition("Game has not started".to_string()));
    };
    if matches!(trigger, Trigger::Host(_))
        && !description::round_complete(&gs.descriptions, round, room.players.len())
    {
        return Err(GameError::Precondition(format!(
            "Waiting for descriptions ({}/{})",
            description::for_round(&gs.descriptions, round).count(),
            room.players.len()
        )));
    }

    gs.current_votes.clear();
    gs.voting_active = true;
    gs.phase_deadline = deadline_after(ctx.now, ctx.config.vote_seconds);
    Ok(())
}

pub(super) fn settle_votes(
    room: &mut Room,
    trigger: &Trigger,
    ctx: &DeltaContext<'_>,
) -> Result<(), GameError> {
    let round = match room.phase() {
        Phase::Voting(r) => r,
        other => {
            return Err(GameError::Precondition(format!(
                "Cannot tally votes from {:?}",
                other
            )))
        }
    };
    check_trigger(room, trigger, round, "finish voting")?;

    let player_count = room.players.len();
    let Some(gs) = room.game_state.as_mut() else {
        return Err(GameError::Precondition("Game has not started".to_string()));
    };
    if matches!(trigger, Trigger::Host(_)) && gs.current_votes.len() < player_count {
        return Err(GameError::Precondition(format!(
            "Waiting for votes ({}/{})",
            gs.current_votes.len(),
            player_count
        )));
    }

    match vote::tally(&gs.current_votes, player_count, &gs.player_cards) {
        Outcome::Advance => {
            gs.round += 1;
            gs.voting_active = false;
            gs.phase_deadline = deadline_after(ctx.now, ctx.config.describe_seconds);
        }
        Outcome::Eliminate {
            voted_out,
            was_imposter,
            imposter_name,
        } => {
            gs.result = Some(GameResult {
                voted_out,
                was_imposter,
                imposter_name,
            });
            gs.voting_active = false;
            gs.phase_deadline = None;
            room.status = RoomStatus::Finished;
        }
    }
    Ok(())
}

impl AppState {
    pub async fn start_game(&self, room_id: &str, caller: &str) -> Result<Room, GameError> {
        let room = self
            .commit(
                room_id,
                RoomDelta::StartGame {
                    caller: caller.to_string(),
                },
            )
            .await?;
        tracing::info!(
            "Game started in room {} with {} players",
            room_id,
            room.players.len()
        );
        Ok(room)
    }

    /// Close descriptions and open voting for the current round
    pub async fn advance_to_voting(&self, room_id: &str, trigger: Trigger) -> Result<Room, GameError> {
        self.commit(room_id, RoomDelta::OpenVoting(trigger)).await
    }

    /// Count the round's votes and either start the next round or end the game
    pub async fn tally_and_advance(&self, room_id: &str, trigger: Trigger) -> Result<Room, GameError> {
        let room = self.commit(room_id, RoomDelta::Tally(trigger)).await?;
        if let Some(result) = room.game_state.as_ref().and_then(|gs| gs.result.as_ref()) {
            tracing::info!(
                "Room {} finished: {} voted out (imposter: {}, was {})",
                room_id,
                result.voted_out,
                result.was_imposter,
                result.imposter_name
            );
        }
        Ok(room)
    }
}
