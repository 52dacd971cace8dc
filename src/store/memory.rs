use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::{ChangeEvent, ChangeOperation, RoomStore, StoreError};
use crate::types::{Room, RoomId};

/// Default broadcast channel capacity for change fan-out
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// In-process room store with broadcast change notifications.
///
/// Events are sent while the write lock is held, so every subscriber sees
/// changes in commit order.
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Room>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            rooms: RwLock::new(HashMap::new()),
            changes: tx,
        }
    }

    fn publish(&self, operation: ChangeOperation, room: Room) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent::rooms(operation, room));
    }
}

impl Default for InMemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn insert(&self, mut room: Room) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            return Err(StoreError::AlreadyExists(room.id));
        }
        room.version = 1;
        rooms.insert(room.id.clone(), room.clone());
        self.publish(ChangeOperation::Insert, room.clone());
        Ok(room)
    }

    async fn get(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.rooms.read().await.values().cloned().collect())
    }

    async fn compare_and_set(
        &self,
        mut room: Room,
        expected_version: u64,
    ) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write().await;
        let current = rooms
            .get(&room.id)
            .ok_or_else(|| StoreError::NotFound(room.id.clone()))?;

        if current.version != expected_version {
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                actual: current.version,
            });
        }

        room.version = expected_version + 1;
        rooms.insert(room.id.clone(), room.clone());
        self.publish(ChangeOperation::Update, room.clone());
        Ok(room)
    }

    async fn delete(&self, id: &str) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.publish(ChangeOperation::Delete, room.clone());
        Ok(room)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
