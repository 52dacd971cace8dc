mod assignment;
mod delta;
mod description;
mod game;
mod registry;
mod vote;

pub use assignment::assign;
pub use delta::{DeltaContext, RoomDelta, Trigger};
pub use description::{for_round, round_complete};
pub use game::{is_valid_transition, MIN_PLAYERS};
pub use vote::{tally, Outcome};

use crate::catalog::CardCatalog;
use crate::error::GameError;
use crate::notifier::ChangeFeed;
use crate::store::{with_backoff, InMemoryRoomStore, RetryPolicy, RoomStore, StoreError};
use crate::types::*;
use std::sync::Arc;

/// Upper bound on read-apply-write cycles for one mutation. Every lost
/// conditional write means another writer committed in between.
const MAX_WRITE_ATTEMPTS: u32 = 16;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoomStore>,
    pub catalog: Arc<CardCatalog>,
    pub config: GameConfig,
    pub retry: RetryPolicy,
}

impl AppState {
    /// In-memory store, default deck and default game settings
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        Self::from_parts(
            Arc::new(InMemoryRoomStore::new()),
            CardCatalog::default(),
            config,
            RetryPolicy::default(),
        )
    }

    pub fn from_parts(
        store: Arc<dyn RoomStore>,
        catalog: CardCatalog,
        config: GameConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            config,
            retry,
        }
    }

    /// Read the latest committed state of a room
    pub async fn get_room(&self, room_id: &str) -> Result<Room, GameError> {
        with_backoff(&self.retry, "get", || self.store.get(room_id))
            .await?
            .ok_or_else(|| GameError::NotFound(format!("Room {} not found", room_id)))
    }

    /// Feed of every room change (lobby view)
    pub fn subscribe_lobby(&self) -> ChangeFeed {
        ChangeFeed::lobby(self.store.subscribe())
    }

    /// Feed of changes to a single room
    pub fn subscribe_room(&self, room_id: &str) -> ChangeFeed {
        ChangeFeed::room(self.store.subscribe(), room_id)
    }

    /// Optimistic write: read the latest room, apply `delta` to that fresh
    /// copy and write it back conditionally on the version that was read.
    /// Lost races are retried from a new read, so concurrent deltas never
    /// overwrite each other.
    pub async fn commit(&self, room_id: &str, delta: RoomDelta) -> Result<Room, GameError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut room = self.get_room(room_id).await?;
            let read_version = room.version;
            let from = room.phase();

            let ctx = DeltaContext {
                catalog: &self.catalog,
                config: &self.config,
                now: chrono::Utc::now(),
            };
            delta.apply(&mut room, &ctx)?;

            let to = room.phase();
            if from != to && !is_valid_transition(&from, &to) {
                return Err(GameError::Precondition(format!(
                    "Invalid phase transition from {:?} to {:?}",
                    from, to
                )));
            }
            if let Err(e) = room.check_invariants() {
                tracing::error!(
                    "Refusing to commit {} to room {}: {}",
                    delta.name(),
                    room_id,
                    e
                );
                return Err(GameError::Precondition(format!(
                    "Inconsistent room state: {}",
                    e
                )));
            }

            match with_backoff(&self.retry, "compare_and_set", || {
                self.store.compare_and_set(room.clone(), read_version)
            })
            .await
            {
                Ok(committed) => {
                    if from != to {
                        tracing::info!("Room {} moved from {:?} to {:?}", room_id, from, to);
                    }
                    return Ok(committed);
                }
                Err(StoreError::VersionMismatch { expected, actual }) => {
                    tracing::debug!(
                        "{} on room {} lost a race (read v{}, store at v{}), attempt {}/{}",
                        delta.name(),
                        room_id,
                        expected,
                        actual,
                        attempt,
                        MAX_WRITE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            "{} on room {} gave up after {} conflicting writes",
            delta.name(),
            room_id,
            MAX_WRITE_ATTEMPTS
        );
        Err(GameError::StoreUnavailable(format!(
            "Too much write contention on room {}",
            room_id
        )))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
