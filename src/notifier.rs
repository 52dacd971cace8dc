//! Change notifier
//!
//! Scoped, ordered views over the store's change stream. A lobby feed sees
//! every room; a room feed sees one room. Subscribers that fall behind get a
//! [`FeedItem::Lagged`] marker and are expected to re-read current state.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::store::ChangeEvent;
use crate::types::RoomId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    Lobby,
    Room(RoomId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// `n` events were dropped before this point
    Lagged(u64),
}

pub struct ChangeFeed {
    rx: broadcast::Receiver<ChangeEvent>,
    scope: FeedScope,
}

impl ChangeFeed {
    pub fn lobby(rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            rx,
            scope: FeedScope::Lobby,
        }
    }

    pub fn room(rx: broadcast::Receiver<ChangeEvent>, room_id: &str) -> Self {
        Self {
            rx,
            scope: FeedScope::Room(room_id.to_string()),
        }
    }

    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    fn wants(&self, event: &ChangeEvent) -> bool {
        match &self.scope {
            FeedScope::Lobby => true,
            FeedScope::Room(id) => event.room_id() == id,
        }
    }

    /// Next in-scope event in commit order, `None` once the store is gone
    pub async fn next(&mut self) -> Option<FeedItem> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(FeedItem::Change(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Change feed ({:?}) lagged, skipped {} events", self.scope, n);
                    return Some(FeedItem::Lagged(n));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
