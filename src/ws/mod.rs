pub mod handlers;
mod host;
mod lobby;
mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::mirror::{MirrorUpdate, RoomMirror};
use crate::notifier::FeedItem;
use crate::protocol::{ClientMessage, Seat, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::store::ChangeEvent;
use crate::types::{Room, RoomSummary};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Reconnect into this room...
    pub room: Option<String>,
    /// ...as this player
    pub name: Option<String>,
}

/// Per-connection session state
#[derive(Debug, Default)]
pub struct Connection {
    pub seat: Option<Seat>,
    mirror: Option<RoomMirror>,
}

impl Connection {
    pub fn sit(&mut self, seat: Seat, room: Room) {
        self.mirror = Some(RoomMirror::from_snapshot(room));
        self.seat = Some(seat);
    }

    pub fn leave(&mut self) {
        self.seat = None;
        self.mirror = None;
    }

    /// Turn a store change into what this connection should see
    pub fn route_change(&mut self, event: ChangeEvent) -> Vec<ServerMessage> {
        let Some(mirror) = self.mirror.as_mut() else {
            return vec![ServerMessage::LobbyChange {
                operation: event.operation,
                room: RoomSummary::from(&event.new_record),
            }];
        };

        let before = mirror.room().map(|r| r.phase());
        match mirror.apply(event) {
            MirrorUpdate::Applied(room) => {
                let mut out = Vec::with_capacity(2);
                if before != Some(room.phase()) {
                    out.push(ServerMessage::phase_of(&room));
                }
                let viewer = self.seat.as_ref().map(|s| s.player_name.as_str());
                out.push(ServerMessage::RoomUpdate {
                    phase: room.phase(),
                    room: room.view_for(viewer),
                });
                out
            }
            MirrorUpdate::Closed(room) => {
                self.leave();
                vec![ServerMessage::RoomClosed { room_id: room.id }]
            }
            MirrorUpdate::Skipped => Vec::new(),
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: room={:?}, name={:?}",
        params.room,
        params.name
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Restore a seat from query params if the player is still in that room
async fn resume(state: &AppState, params: WsQuery) -> Option<(Seat, Room)> {
    let (room_id, name) = (params.room?, params.name?);
    match state.get_room(&room_id).await {
        Ok(room) if room.player(&name).is_some() => Some((
            Seat {
                room_id,
                player_name: name,
            },
            room,
        )),
        Ok(_) => {
            tracing::warn!("{} is not in room {}, starting in lobby", name, room_id);
            None
        }
        Err(e) => {
            tracing::warn!("Could not resume into room {}: {}", room_id, e);
            None
        }
    }
}

/// Fresh state after the feed dropped events
async fn resync(conn: &mut Connection, state: &AppState) -> Vec<ServerMessage> {
    let Some(seat) = conn.seat.clone() else {
        return lobby::handle_list_rooms(state).await.into_iter().collect();
    };
    match state.get_room(&seat.room_id).await {
        Ok(room) => {
            let msgs = vec![
                ServerMessage::phase_of(&room),
                ServerMessage::RoomUpdate {
                    phase: room.phase(),
                    room: room.view_for(Some(&seat.player_name)),
                },
            ];
            conn.sit(seat, room);
            msgs
        }
        Err(e) => {
            conn.leave();
            vec![e.into()]
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading anything so no change falls in between
    let mut feed = state.subscribe_lobby();
    let mut conn = Connection::default();

    let mut greeting = Vec::new();
    let resumed = resume(&state, params).await;
    greeting.push(ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        server_now: chrono::Utc::now(),
        seat: resumed.as_ref().map(|(seat, _)| seat.clone()),
    });
    match resumed {
        Some((seat, room)) => {
            tracing::info!("{} reconnected to room {}", seat.player_name, seat.room_id);
            greeting.push(ServerMessage::phase_of(&room));
            greeting.push(ServerMessage::Seated {
                seat: seat.clone(),
                room: room.view_for(Some(&seat.player_name)),
            });
            conn.sit(seat, room);
        }
        None => greeting.extend(lobby::handle_list_rooms(&state).await),
    }

    for msg in &greeting {
        if let Ok(json) = serde_json::to_string(msg) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                tracing::error!("Failed to send welcome message");
                return;
            }
        }
    }

    loop {
        let outgoing: Vec<ServerMessage> = tokio::select! {
            item = feed.next() => match item {
                Some(FeedItem::Change(event)) => conn.route_change(event),
                Some(FeedItem::Lagged(_)) => resync(&mut conn, &state).await,
                None => break,
            },

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &mut conn, &state)
                                .await
                                .into_iter()
                                .collect(),
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                vec![ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                )]
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        Vec::new()
                    }
                    Some(Ok(_)) => Vec::new(),
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        };

        for msg in outgoing {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    tracing::error!("Failed to send message");
                    return;
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed (seat: {:?})", conn.seat);
}
