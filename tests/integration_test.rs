use async_trait::async_trait;
use imposter::protocol::{ClientMessage, ServerMessage};
use imposter::state::AppState;
use imposter::store::{ChangeEvent, InMemoryRoomStore, RetryPolicy, RoomStore, StoreError};
use imposter::types::{GameConfig, Phase, Player, Room, VoteTarget};
use imposter::ws::handlers::handle_message;
use imposter::ws::Connection;
use imposter::{catalog::CardCatalog, error::GameError};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

async fn send(conn: &mut Connection, state: &Arc<AppState>, msg: ClientMessage) -> ServerMessage {
    handle_message(msg, conn, state)
        .await
        .expect("every client message gets a response")
}

fn expect_phase(msg: ServerMessage, expected: Phase) {
    match msg {
        ServerMessage::Phase { phase, .. } => assert_eq!(phase, expected),
        other => panic!("Expected Phase {:?}, got {:?}", expected, other),
    }
}

fn expect_error(msg: ServerMessage, expected_code: &str) {
    match msg {
        ServerMessage::Error { code, .. } => assert_eq!(code, expected_code),
        other => panic!("Expected {} error, got {:?}", expected_code, other),
    }
}

/// End-to-end integration test for a complete game flow
#[tokio::test]
async fn test_full_game_flow() {
    let state = Arc::new(AppState::new());
    let names = ["Alice", "Bob", "Carol", "Dave", "Eve"];
    let mut conns: Vec<Connection> = names.iter().map(|_| Connection::default()).collect();

    // 1. Alice creates and hosts a room
    let room_id = match send(
        &mut conns[0],
        &state,
        ClientMessage::CreateRoom {
            name: "Game Night".to_string(),
            host_name: "Alice".to_string(),
        },
    )
    .await
    {
        ServerMessage::Seated { seat, room } => {
            assert_eq!(seat.player_name, "Alice");
            assert_eq!(room.host, "Alice");
            room.id
        }
        other => panic!("Expected Seated, got {:?}", other),
    };

    // 2. Everyone else joins from the lobby
    let mut lobby = Connection::default();
    match send(&mut lobby, &state, ClientMessage::ListRooms).await {
        ServerMessage::Rooms { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].id, room_id);
        }
        other => panic!("Expected Rooms, got {:?}", other),
    }
    for (i, name) in names.iter().enumerate().skip(1) {
        let msg = send(
            &mut conns[i],
            &state,
            ClientMessage::JoinRoom {
                room_id: room_id.clone(),
                player_name: name.to_string(),
            },
        )
        .await;
        assert!(matches!(msg, ServerMessage::Seated { .. }), "{:?}", msg);
    }

    // 3. Only the host can start
    expect_error(
        send(&mut conns[1], &state, ClientMessage::StartGame).await,
        "PRECONDITION_FAILED",
    );
    expect_phase(
        send(&mut conns[0], &state, ClientMessage::StartGame).await,
        Phase::Describing(1),
    );

    // 4. Everyone looks at their card
    let mut imposter = None;
    let mut secret = None;
    for (i, name) in names.iter().enumerate() {
        match send(&mut conns[i], &state, ClientMessage::RevealCard).await {
            ServerMessage::YourCard { card, is_imposter } => {
                if is_imposter {
                    assert!(card.is_none());
                    assert!(imposter.replace(name.to_string()).is_none());
                } else {
                    let card = card.expect("crew gets the secret card");
                    if let Some(prev) = secret.replace(card.clone()) {
                        assert_eq!(prev, card);
                    }
                }
            }
            other => panic!("Expected YourCard, got {:?}", other),
        }
    }
    let imposter = imposter.expect("someone is the imposter");

    // 5. Round 1 descriptions, with one duplicate attempt
    for (i, name) in names.iter().enumerate() {
        let msg = send(
            &mut conns[i],
            &state,
            ClientMessage::SubmitDescription {
                round: 1,
                text: format!("{} says it is nice", name),
            },
        )
        .await;
        assert!(matches!(msg, ServerMessage::DescriptionAccepted { round: 1 }));
    }
    expect_error(
        send(
            &mut conns[2],
            &state,
            ClientMessage::SubmitDescription {
                round: 1,
                text: "again".to_string(),
            },
        )
        .await,
        "DUPLICATE_SUBMISSION",
    );

    // 6. Voting: majority wants another round
    expect_phase(
        send(&mut conns[0], &state, ClientMessage::AdvanceToVoting).await,
        Phase::Voting(1),
    );
    for i in 0..names.len() {
        let target = if i < 3 {
            VoteTarget::Continue
        } else {
            VoteTarget::from(names[1])
        };
        let msg = send(&mut conns[i], &state, ClientMessage::CastVote { target }).await;
        assert!(matches!(msg, ServerMessage::VoteAccepted { .. }));
    }
    expect_phase(
        send(&mut conns[0], &state, ClientMessage::FinishVoting).await,
        Phase::Describing(2),
    );

    // 7. Round 2, then everyone but the imposter votes the imposter out
    for (i, name) in names.iter().enumerate() {
        send(
            &mut conns[i],
            &state,
            ClientMessage::SubmitDescription {
                round: 2,
                text: format!("{} has more to say", name),
            },
        )
        .await;
    }
    expect_phase(
        send(&mut conns[0], &state, ClientMessage::AdvanceToVoting).await,
        Phase::Voting(2),
    );
    let scapegoat = names.iter().find(|n| **n != imposter).unwrap().to_string();
    for (i, name) in names.iter().enumerate() {
        let target = if *name == imposter {
            VoteTarget::Player(scapegoat.clone())
        } else {
            VoteTarget::Player(imposter.clone())
        };
        send(&mut conns[i], &state, ClientMessage::CastVote { target }).await;
    }
    match send(&mut conns[0], &state, ClientMessage::FinishVoting).await {
        ServerMessage::Phase { phase, result, .. } => {
            assert_eq!(phase, Phase::Finished);
            let result = result.expect("finished game has a result");
            assert_eq!(result.voted_out, imposter);
            assert!(result.was_imposter);
            assert_eq!(result.imposter_name, imposter);
        }
        other => panic!("Expected Phase, got {:?}", other),
    }

    // 8. Reset deletes the room; other seats fall back to the lobby
    match send(&mut conns[3], &state, ClientMessage::ResetRoom).await {
        ServerMessage::Rooms { rooms } => assert!(rooms.is_empty()),
        other => panic!("Expected Rooms, got {:?}", other),
    }
    assert!(conns[3].seat.is_none());

    expect_error(
        send(&mut conns[1], &state, ClientMessage::RevealCard).await,
        "NOT_FOUND",
    );
    assert!(conns[1].seat.is_none());
}

#[tokio::test]
async fn test_messages_need_a_seat() {
    let state = Arc::new(AppState::new());
    let mut conn = Connection::default();

    for msg in [
        ClientMessage::StartGame,
        ClientMessage::RevealCard,
        ClientMessage::CastVote {
            target: VoteTarget::Continue,
        },
    ] {
        expect_error(send(&mut conn, &state, msg).await, "NOT_SEATED");
    }
}

#[tokio::test]
async fn test_lobby_validation_errors() {
    let state = Arc::new(AppState::new());
    let mut conn = Connection::default();

    expect_error(
        send(
            &mut conn,
            &state,
            ClientMessage::CreateRoom {
                name: "  ".to_string(),
                host_name: "Alice".to_string(),
            },
        )
        .await,
        "VALIDATION_ERROR",
    );
    expect_error(
        send(
            &mut conn,
            &state,
            ClientMessage::JoinRoom {
                room_id: "01NOPE".to_string(),
                player_name: "Bob".to_string(),
            },
        )
        .await,
        "NOT_FOUND",
    );
    assert!(conn.seat.is_none());
}

#[tokio::test]
async fn test_seated_connection_receives_room_updates() {
    let state = Arc::new(AppState::new());
    let mut feed = state.subscribe_lobby();
    let mut alice = Connection::default();

    send(
        &mut alice,
        &state,
        ClientMessage::CreateRoom {
            name: "Feed".to_string(),
            host_name: "Alice".to_string(),
        },
    )
    .await;
    let room_id = alice.seat.clone().unwrap().room_id;
    state.join_room(&room_id, "Bob").await.unwrap();

    let mut updates = Vec::new();
    for _ in 0..2 {
        if let Some(imposter::notifier::FeedItem::Change(event)) = feed.next().await {
            updates.extend(alice.route_change(event));
        }
    }

    // The insert predates the seat snapshot and is skipped as stale
    match updates.as_slice() {
        [ServerMessage::RoomUpdate { room, phase }] => {
            assert_eq!(*phase, Phase::Waiting);
            assert_eq!(room.players.len(), 2);
        }
        other => panic!("Unexpected updates {:?}", other),
    }

    send(&mut alice, &state, ClientMessage::ReturnToLobby).await;
    state.create_room("Other", "Zed").await.unwrap();
    if let Some(imposter::notifier::FeedItem::Change(event)) = feed.next().await {
        assert!(matches!(
            alice.route_change(event).as_slice(),
            [ServerMessage::LobbyChange { .. }]
        ));
    }
}

/// Store that fails a number of calls with a transient error before
/// delegating to the in-memory store
struct FlakyStore {
    inner: InMemoryRoomStore,
    failures_left: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryRoomStore::new(),
            failures_left: AtomicU32::new(failures),
        }
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for FlakyStore {
    async fn insert(&self, room: Room) -> Result<Room, StoreError> {
        self.maybe_fail()?;
        self.inner.insert(room).await
    }

    async fn get(&self, id: &str) -> Result<Option<Room>, StoreError> {
        self.maybe_fail()?;
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Room>, StoreError> {
        self.maybe_fail()?;
        self.inner.list().await
    }

    async fn compare_and_set(&self, room: Room, expected_version: u64) -> Result<Room, StoreError> {
        self.maybe_fail()?;
        self.inner.compare_and_set(room, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<Room, StoreError> {
        self.maybe_fail()?;
        self.inner.delete(id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let state = Arc::new(AppState::from_parts(
        Arc::new(FlakyStore::new(2)),
        CardCatalog::default(),
        GameConfig::default(),
        fast_retry(),
    ));

    let room = state.create_room("Flaky", "Alice").await.unwrap();
    assert_eq!(room.version, 1);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_store_unavailable() {
    let state = Arc::new(AppState::from_parts(
        Arc::new(FlakyStore::new(1_000)),
        CardCatalog::default(),
        GameConfig::default(),
        fast_retry(),
    ));

    let err = state.create_room("Down", "Alice").await.unwrap_err();
    assert!(matches!(err, GameError::StoreUnavailable(_)));

    let mut conn = Connection::default();
    expect_error(
        send(&mut conn, &state, ClientMessage::ListRooms).await,
        "STORE_UNAVAILABLE",
    );
}

/// Store where another writer commits between a reader's read and its
/// first conditional write
struct RacingStore {
    inner: InMemoryRoomStore,
    interfere: AtomicBool,
}

#[async_trait]
impl RoomStore for RacingStore {
    async fn insert(&self, room: Room) -> Result<Room, StoreError> {
        self.inner.insert(room).await
    }

    async fn get(&self, id: &str) -> Result<Option<Room>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Room>, StoreError> {
        self.inner.list().await
    }

    async fn compare_and_set(&self, room: Room, expected_version: u64) -> Result<Room, StoreError> {
        if self.interfere.swap(false, Ordering::SeqCst) {
            if let Some(mut current) = self.inner.get(&room.id).await? {
                current.players.push(Player {
                    id: "sneaky-id".to_string(),
                    name: "Sneaky".to_string(),
                });
                let version = current.version;
                self.inner.compare_and_set(current, version).await?;
            }
        }
        self.inner.compare_and_set(room, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<Room, StoreError> {
        self.inner.delete(id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }
}

#[tokio::test]
async fn test_interleaved_writer_is_not_overwritten() {
    let store = Arc::new(RacingStore {
        inner: InMemoryRoomStore::new(),
        interfere: AtomicBool::new(false),
    });
    let state = AppState::from_parts(
        store.clone(),
        CardCatalog::default(),
        GameConfig::default(),
        RetryPolicy::default(),
    );

    let room = state.create_room("Race", "Alice").await.unwrap();
    store.interfere.store(true, Ordering::SeqCst);

    let room = state.join_room(&room.id, "Bob").await.unwrap();
    let names: Vec<_> = room.players.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Sneaky", "Bob"]);
    assert_eq!(room.version, 3);
}

#[tokio::test]
async fn test_room_updates_hide_other_players_cards() {
    let state = Arc::new(AppState::new());
    let mut alice = Connection::default();
    send(
        &mut alice,
        &state,
        ClientMessage::CreateRoom {
            name: "Secrets".to_string(),
            host_name: "Alice".to_string(),
        },
    )
    .await;
    let room_id = alice.seat.clone().unwrap().room_id;
    state.join_room(&room_id, "Carol").await.unwrap();

    let mut bob = Connection::default();
    send(
        &mut bob,
        &state,
        ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            player_name: "Bob".to_string(),
        },
    )
    .await;

    // Only the start is newer than Bob's seat
    let mut feed = state.subscribe_room(&room_id);
    send(&mut alice, &state, ClientMessage::StartGame).await;
    let full = state.get_room(&room_id).await.unwrap();
    let bobs_card = full.game_state.as_ref().unwrap().card_for("Bob").unwrap().clone();

    let Some(imposter::notifier::FeedItem::Change(event)) = feed.next().await else {
        panic!("expected the start event");
    };
    let seen = bob
        .route_change(event)
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::RoomUpdate { room, .. } => room.game_state,
            _ => None,
        })
        .unwrap();
    assert_eq!(seen.player_cards, vec![bobs_card.clone()]);
    assert_eq!(seen.secret_card, bobs_card.card);

    let outsider = full.view_for(None);
    assert!(outsider.game_state.unwrap().player_cards.is_empty());
}
