use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomId = String;
pub type PlayerId = String;
pub type CardId = u32;

/// Vote value meaning "play another round"
pub const CONTINUE_VOTE: &str = "continue";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Explicit phase of a room's game, derived from `status` and the game state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", content = "round", rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Describing(u32),
    Voting(u32),
    Finished,
}

impl Phase {
    /// Round the phase belongs to, if a game is running
    pub fn round(&self) -> Option<u32> {
        match self {
            Phase::Describing(r) | Phase::Voting(r) => Some(*r),
            Phase::Waiting | Phase::Finished => None,
        }
    }
}

/// What happens when a phase timer runs out before anyone acted in the phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerExpiryPolicy {
    /// Fire the advance trigger regardless of activity
    ForceAdvance,
    /// Keep the timer expired until at least one description/vote exists
    WaitForActivity,
}

impl std::str::FromStr for TimerExpiryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force" | "force_advance" => Ok(Self::ForceAdvance),
            "wait" | "wait_for_activity" => Ok(Self::WaitForActivity),
            other => Err(format!("unknown timer expiry policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub describe_seconds: u32,
    pub vote_seconds: u32,
    pub max_description_chars: usize,
    pub expiry_policy: TimerExpiryPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            describe_seconds: 60,
            vote_seconds: 45,
            max_description_chars: 280,
            expiry_policy: TimerExpiryPolicy::ForceAdvance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerCard {
    pub player_id: PlayerId,
    pub player_name: String,
    /// None for the imposter
    pub card: Option<Card>,
    pub is_imposter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Description {
    pub player: String,
    pub round: u32,
    pub text: String,
}

/// A vote is either a player name (evict) or the `continue` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VoteTarget {
    Continue,
    Player(String),
}

impl From<String> for VoteTarget {
    fn from(value: String) -> Self {
        if value == CONTINUE_VOTE {
            VoteTarget::Continue
        } else {
            VoteTarget::Player(value)
        }
    }
}

impl From<VoteTarget> for String {
    fn from(target: VoteTarget) -> Self {
        match target {
            VoteTarget::Continue => CONTINUE_VOTE.to_string(),
            VoteTarget::Player(name) => name,
        }
    }
}

impl From<&str> for VoteTarget {
    fn from(value: &str) -> Self {
        VoteTarget::from(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CastVote {
    pub voter: String,
    pub target: VoteTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameResult {
    pub voted_out: String,
    pub was_imposter: bool,
    pub imposter_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    /// Absent only in a copy redacted for the imposter or an outsider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_card: Option<Card>,
    pub player_cards: Vec<PlayerCard>,
    pub round: u32,
    pub descriptions: Vec<Description>,
    /// Insertion ordered; a changed vote keeps the voter's original slot
    pub current_votes: Vec<CastVote>,
    pub voting_active: bool,
    pub result: Option<GameResult>,
    /// When the running phase timer expires
    #[serde(default)]
    pub phase_deadline: Option<DateTime<Utc>>,
}

impl GameState {
    pub fn imposter(&self) -> Option<&PlayerCard> {
        self.player_cards.iter().find(|pc| pc.is_imposter)
    }

    pub fn card_for(&self, player_name: &str) -> Option<&PlayerCard> {
        self.player_cards
            .iter()
            .find(|pc| pc.player_name == player_name)
    }

    pub fn vote_of(&self, voter: &str) -> Option<&VoteTarget> {
        self.current_votes
            .iter()
            .find(|v| v.voter == voter)
            .map(|v| &v.target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Host player's name
    pub host: String,
    /// Join order
    pub players: Vec<Player>,
    pub status: RoomStatus,
    pub game_state: Option<GameState>,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every committed write
    pub version: u64,
}

impl Room {
    pub fn phase(&self) -> Phase {
        match (&self.status, &self.game_state) {
            (RoomStatus::Waiting, _) | (_, None) => Phase::Waiting,
            (RoomStatus::Finished, Some(_)) => Phase::Finished,
            (RoomStatus::Playing, Some(gs)) if gs.voting_active => Phase::Voting(gs.round),
            (RoomStatus::Playing, Some(gs)) => Phase::Describing(gs.round),
        }
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn is_host(&self, name: &str) -> bool {
        self.host == name
    }

    /// Copy of the room as `viewer` may see it. While a game runs, only the
    /// viewer's own card survives and the secret card is kept only for crew.
    /// A finished game is shown in full.
    pub fn view_for(&self, viewer: Option<&str>) -> Room {
        let mut room = self.clone();
        if self.status != RoomStatus::Playing {
            return room;
        }
        if let Some(gs) = room.game_state.as_mut() {
            gs.player_cards
                .retain(|pc| viewer.is_some_and(|name| pc.player_name == name));
            gs.secret_card = gs.player_cards.first().and_then(|pc| pc.card.clone());
        }
        room
    }

    /// Check the record-level invariants every committed room must satisfy
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.player(&self.host).is_none() {
            return Err(format!("host '{}' is not a player", self.host));
        }

        match (&self.status, &self.game_state) {
            (RoomStatus::Waiting, Some(_)) => {
                return Err("waiting room must not carry a game state".to_string())
            }
            (RoomStatus::Playing | RoomStatus::Finished, None) => {
                return Err(format!("{:?} room is missing its game state", self.status))
            }
            _ => {}
        }

        let Some(gs) = &self.game_state else {
            return Ok(());
        };

        if gs.round < 1 {
            return Err("round must start at 1".to_string());
        }
        if gs.player_cards.len() != self.players.len() {
            return Err(format!(
                "{} player cards for {} players",
                gs.player_cards.len(),
                self.players.len()
            ));
        }
        if gs.secret_card.is_none() {
            return Err("game state has no secret card".to_string());
        }
        let imposters = gs.player_cards.iter().filter(|pc| pc.is_imposter).count();
        if imposters != 1 {
            return Err(format!("expected exactly one imposter, found {}", imposters));
        }
        for pc in &gs.player_cards {
            let expected = if pc.is_imposter {
                None
            } else {
                gs.secret_card.as_ref()
            };
            if pc.card.as_ref() != expected {
                return Err(format!("card mismatch for {}", pc.player_name));
            }
        }
        for (i, d) in gs.descriptions.iter().enumerate() {
            if gs.descriptions[..i]
                .iter()
                .any(|other| other.player == d.player && other.round == d.round)
            {
                return Err(format!(
                    "duplicate description by {} in round {}",
                    d.player, d.round
                ));
            }
        }
        for (i, v) in gs.current_votes.iter().enumerate() {
            if gs.current_votes[..i].iter().any(|other| other.voter == v.voter) {
                return Err(format!("duplicate vote by {}", v.voter));
            }
        }
        match (&self.status, &gs.result) {
            (RoomStatus::Finished, None) => Err("finished room has no result".to_string()),
            (RoomStatus::Playing, Some(_)) => Err("running game already has a result".to_string()),
            _ => Ok(()),
        }
    }
}

/// Lobby listing entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub host: String,
    pub player_count: usize,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            host: room.host.clone(),
            player_count: room.players.len(),
            status: room.status,
            created_at: room.created_at,
        }
    }
}
