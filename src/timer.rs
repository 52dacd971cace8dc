//! Phase timers
//!
//! One countdown per room for the phase it is currently in. When it runs out
//! it fires the same advance the host would, tagged as a timer trigger so a
//! late or repeated expiry can never skip a phase. A single driver task owns
//! all timers and keeps them in step with the change stream.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::GameError;
use crate::notifier::FeedItem;
use crate::state::{for_round, AppState, Trigger};
use crate::store::ChangeOperation;
use crate::types::*;

/// Wall-clock length of one countdown unit
pub const TIMER_UNIT: Duration = Duration::from_secs(1);

/// Countdown for one room phase. Dropping it cancels the countdown.
pub struct PhaseTimer {
    room_id: RoomId,
    phase: Phase,
    remaining: watch::Receiver<u32>,
    handle: JoinHandle<()>,
}

impl PhaseTimer {
    /// Arm a timer for the room's current phase. Rooms outside a timed phase
    /// get none. A stored deadline shortens the countdown so a re-armed timer
    /// keeps the original expiry.
    pub fn start(state: Arc<AppState>, room: &Room) -> Option<Self> {
        let phase = room.phase();
        let full = match phase {
            Phase::Describing(_) => state.config.describe_seconds,
            Phase::Voting(_) => state.config.vote_seconds,
            Phase::Waiting | Phase::Finished => return None,
        };
        let units = room
            .game_state
            .as_ref()
            .and_then(|gs| gs.phase_deadline)
            .map(|deadline| {
                let ms = (deadline - Utc::now()).num_milliseconds().max(0);
                u32::try_from((ms + 999) / 1000).unwrap_or(u32::MAX).min(full)
            })
            .unwrap_or(full);

        let (tx, rx) = watch::channel(units);
        let handle = tokio::spawn(run(state, room.id.clone(), phase, units, tx));
        tracing::debug!("Armed {:?} timer for room {} ({} units)", phase, room.id, units);

        Some(Self {
            room_id: room.id.clone(),
            phase,
            remaining: rx,
            handle,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Units left before expiry
    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    /// True once the countdown fired (or gave up)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        tracing::debug!("Cancelled {:?} timer for room {}", self.phase, self.room_id);
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Has anyone acted in the room's current phase?
fn has_activity(room: &Room) -> bool {
    let Some(gs) = &room.game_state else {
        return false;
    };
    match room.phase() {
        Phase::Describing(r) => for_round(&gs.descriptions, r).next().is_some(),
        Phase::Voting(_) => !gs.current_votes.is_empty(),
        Phase::Waiting | Phase::Finished => false,
    }
}

async fn run(
    state: Arc<AppState>,
    room_id: RoomId,
    phase: Phase,
    units: u32,
    remaining: watch::Sender<u32>,
) {
    let mut ticker = tokio::time::interval(TIMER_UNIT);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    let mut left = units;
    while left > 0 {
        ticker.tick().await;
        left -= 1;
        remaining.send_replace(left);
    }

    let Some(round) = phase.round() else {
        return;
    };
    let mut reported_idle = false;
    loop {
        match state.get_room(&room_id).await {
            Ok(room) if room.phase() != phase => return,
            Ok(room) => {
                if state.config.expiry_policy == TimerExpiryPolicy::WaitForActivity
                    && !has_activity(&room)
                {
                    if !reported_idle {
                        tracing::debug!(
                            "{:?} timer for room {} expired with no activity, holding",
                            phase,
                            room_id
                        );
                        reported_idle = true;
                    }
                    ticker.tick().await;
                    continue;
                }
            }
            Err(GameError::NotFound(_)) => return,
            Err(e) => {
                tracing::warn!("Phase timer for room {} could not read room: {}", room_id, e);
                ticker.tick().await;
                continue;
            }
        }

        let trigger = Trigger::Timer { round };
        let result = match phase {
            Phase::Describing(_) => state.advance_to_voting(&room_id, trigger).await,
            Phase::Voting(_) => state.tally_and_advance(&room_id, trigger).await,
            Phase::Waiting | Phase::Finished => return,
        };
        match result {
            Ok(room) => {
                tracing::info!(
                    "Phase timer moved room {} from {:?} to {:?}",
                    room_id,
                    phase,
                    room.phase()
                );
                return;
            }
            // Keep firing once per unit until the room leaves the phase
            Err(e @ GameError::StoreUnavailable(_)) => {
                tracing::warn!("Phase timer for room {} could not advance: {}", room_id, e);
                ticker.tick().await;
            }
            Err(e) => {
                tracing::debug!("Phase timer for room {} had nothing to do: {}", room_id, e);
                return;
            }
        }
    }
}

/// Make sure `room` has exactly the timer its phase calls for
fn reconcile(state: &Arc<AppState>, timers: &mut HashMap<RoomId, PhaseTimer>, room: &Room) {
    let phase = room.phase();
    if timers
        .get(&room.id)
        .is_some_and(|t| t.phase() == phase && !t.is_finished())
    {
        return;
    }
    if let Some(old) = timers.remove(&room.id) {
        old.cancel();
    }
    if let Some(timer) = PhaseTimer::start(state.clone(), room) {
        timers.insert(room.id.clone(), timer);
    }
}

async fn resync(state: &Arc<AppState>, timers: &mut HashMap<RoomId, PhaseTimer>) {
    match state.all_rooms().await {
        Ok(rooms) => {
            let live: HashSet<&str> = rooms.iter().map(|r| r.id.as_str()).collect();
            timers.retain(|id, _| live.contains(id.as_str()));
            for room in &rooms {
                reconcile(state, timers, room);
            }
        }
        Err(e) => tracing::warn!("Could not resync phase timers: {}", e),
    }
}

/// Drive phase timers for every room until the change stream closes
pub fn spawn_phase_timers(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut feed = state.subscribe_lobby();
        let mut timers: HashMap<RoomId, PhaseTimer> = HashMap::new();
        resync(&state, &mut timers).await;

        while let Some(item) = feed.next().await {
            match item {
                FeedItem::Change(event) => match event.operation {
                    ChangeOperation::Delete => {
                        if let Some(timer) = timers.remove(event.room_id()) {
                            timer.cancel();
                        }
                    }
                    ChangeOperation::Insert | ChangeOperation::Update => {
                        reconcile(&state, &mut timers, &event.new_record)
                    }
                },
                FeedItem::Lagged(_) => resync(&state, &mut timers).await,
            }
        }

        tracing::info!("Change feed closed, phase timers stopped");
    })
}
