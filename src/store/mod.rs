//! Room store boundary
//!
//! The store is a durable map from room id to [`Room`] that supports
//! conditional (compare-and-set) writes and publishes a [`ChangeEvent`] for
//! every committed insert, update and delete.

mod memory;
mod retry;

pub use memory::InMemoryRoomStore;
pub use retry::{with_backoff, RetryPolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Room, RoomId};

/// Table name carried by every change event
pub const ROOMS_TABLE: &str = "rooms";

/// Errors a room store can report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Room {0} not found")]
    NotFound(RoomId),

    #[error("Room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("Conditional write rejected: expected version {expected}, found {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// Notification emitted for every committed write.
///
/// For deletes `new_record` holds the last stored state of the removed room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub operation: ChangeOperation,
    pub new_record: Room,
}

impl ChangeEvent {
    pub fn rooms(operation: ChangeOperation, record: Room) -> Self {
        Self {
            table: ROOMS_TABLE.to_string(),
            operation,
            new_record: record,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.new_record.id
    }
}

/// Storage interface for rooms
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist a new room. The stored copy starts at version 1.
    async fn insert(&self, room: Room) -> Result<Room, StoreError>;

    /// Fetch the latest committed state of a room
    async fn get(&self, id: &str) -> Result<Option<Room>, StoreError>;

    /// All rooms, in no particular order
    async fn list(&self) -> Result<Vec<Room>, StoreError>;

    /// Replace the stored room if its version still equals `expected_version`.
    /// Returns the committed room with its bumped version.
    async fn compare_and_set(&self, room: Room, expected_version: u64)
        -> Result<Room, StoreError>;

    /// Remove a room, returning its last state
    async fn delete(&self, id: &str) -> Result<Room, StoreError>;

    /// Subscribe to change events for all rooms
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
