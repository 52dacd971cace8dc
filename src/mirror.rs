//! Client-side room mirror
//!
//! Keeps a local copy of one room in sync with the change stream. Events are
//! applied only if they are well formed, belong to the mirrored room and are
//! newer than what the mirror already holds.

use crate::store::{ChangeEvent, ChangeOperation, ROOMS_TABLE};
use crate::types::{Room, RoomId};

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorUpdate {
    /// The mirror now holds this room
    Applied(Room),
    /// The room was deleted; carries its last known state
    Closed(Room),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct RoomMirror {
    room_id: RoomId,
    room: Option<Room>,
}

impl RoomMirror {
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            room: None,
        }
    }

    pub fn from_snapshot(room: Room) -> Self {
        Self {
            room_id: room.id.clone(),
            room: Some(room),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn apply(&mut self, event: ChangeEvent) -> MirrorUpdate {
        if event.table != ROOMS_TABLE {
            tracing::warn!("Ignoring change event for table {}", event.table);
            return MirrorUpdate::Skipped;
        }
        if event.room_id() != self.room_id {
            return MirrorUpdate::Skipped;
        }

        if event.operation == ChangeOperation::Delete {
            self.room = None;
            return MirrorUpdate::Closed(event.new_record);
        }

        if let Err(reason) = event.new_record.check_invariants() {
            tracing::warn!(
                "Ignoring malformed update for room {}: {}",
                self.room_id,
                reason
            );
            return MirrorUpdate::Skipped;
        }
        if let Some(current) = &self.room {
            if event.new_record.version <= current.version {
                tracing::debug!(
                    "Ignoring stale update for room {} (v{} <= v{})",
                    self.room_id,
                    event.new_record.version,
                    current.version
                );
                return MirrorUpdate::Skipped;
            }
        }

        self.room = Some(event.new_record.clone());
        MirrorUpdate::Applied(event.new_record)
    }

    /// Apply an event in its JSON wire form. Undecodable payloads are skipped.
    ///
    /// In-process feeds hand over typed [`ChangeEvent`]s and go through
    /// [`apply`](Self::apply); this is the entry point for a notifier that
    /// delivers raw payloads from outside the process.
    pub fn apply_json(&mut self, raw: &str) -> MirrorUpdate {
        match serde_json::from_str::<ChangeEvent>(raw) {
            Ok(event) => self.apply(event),
            Err(e) => {
                tracing::warn!("Ignoring undecodable change event: {}", e);
                MirrorUpdate::Skipped
            }
        }
    }
}
