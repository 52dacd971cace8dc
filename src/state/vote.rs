use serde::Serialize;

use super::{AppState, RoomDelta};
use crate::error::GameError;
use crate::types::*;

/// Result of counting a round's votes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Play another describing round
    Advance,
    /// The game ends with `voted_out` evicted
    Eliminate {
        voted_out: String,
        was_imposter: bool,
        imposter_name: String,
    },
}

/// Count votes.
///
/// A strict majority of `continue` among the votes cast advances the round.
/// Otherwise the player with the most eviction votes is out; ties go to the
/// player whose first vote arrived earliest in `votes`. With no eviction
/// votes at all the round advances.
pub fn tally(votes: &[CastVote], total_players: usize, player_cards: &[PlayerCard]) -> Outcome {
    let continue_votes = votes
        .iter()
        .filter(|v| v.target == VoteTarget::Continue)
        .count();
    tracing::debug!(
        "Tallying {}/{} votes, {} to continue",
        votes.len(),
        total_players,
        continue_votes
    );

    if continue_votes * 2 > votes.len() {
        return Outcome::Advance;
    }

    // First-seen order, counts accumulated in place
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for vote in votes {
        if let VoteTarget::Player(name) = &vote.target {
            match counts.iter_mut().find(|entry| entry.0 == name.as_str()) {
                Some(entry) => entry.1 += 1,
                None => counts.push((name.as_str(), 1)),
            }
        }
    }

    // Stable, so ties keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let Some(&(voted_out, _)) = counts.first() else {
        return Outcome::Advance;
    };

    let imposter_name = player_cards
        .iter()
        .find(|pc| pc.is_imposter)
        .map(|pc| pc.player_name.clone())
        .unwrap_or_default();

    Outcome::Eliminate {
        voted_out: voted_out.to_string(),
        was_imposter: voted_out == imposter_name,
        imposter_name,
    }
}

pub(super) fn record(room: &mut Room, vote: &CastVote) -> Result<(), GameError> {
    if room.player(&vote.voter).is_none() {
        return Err(GameError::Precondition(format!(
            "{} is not a player in this room",
            vote.voter
        )));
    }
    if let VoteTarget::Player(name) = &vote.target {
        if room.player(name).is_none() {
            return Err(GameError::Validation(format!(
                "Vote target '{}' is neither a player nor '{}'",
                name, CONTINUE_VOTE
            )));
        }
    }
    if !matches!(room.phase(), Phase::Voting(_)) {
        return Err(GameError::Precondition("Voting is not open".to_string()));
    }

    let Some(gs) = room.game_state.as_mut() else {
        return Err(GameError::Precondition("Game has not started".to_string()));
    };
    match gs.current_votes.iter_mut().find(|v| v.voter == vote.voter) {
        Some(existing) => existing.target = vote.target.clone(),
        None => gs.current_votes.push(vote.clone()),
    }
    Ok(())
}

impl AppState {
    /// Record or replace a player's vote for the open round
    pub async fn cast_vote(
        &self,
        room_id: &str,
        voter: &str,
        target: VoteTarget,
    ) -> Result<Room, GameError> {
        let delta = RoomDelta::CastVote(CastVote {
            voter: voter.to_string(),
            target: target.clone(),
        });
        let room = self.commit(room_id, delta).await?;

        if let Some(gs) = &room.game_state {
            tracing::info!(
                "{} voted {} in room {} ({}/{})",
                voter,
                String::from(target),
                room_id,
                gs.current_votes.len(),
                room.players.len()
            );
        }
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::*;
    use crate::state::Trigger;
    use proptest::prelude::*;

    fn cards(names: &[&str], imposter: &str) -> Vec<PlayerCard> {
        names
            .iter()
            .map(|n| PlayerCard {
                player_id: format!("id-{}", n),
                player_name: n.to_string(),
                card: None,
                is_imposter: *n == imposter,
            })
            .collect()
    }

    fn votes(pairs: &[(&str, &str)]) -> Vec<CastVote> {
        pairs
            .iter()
            .map(|(voter, target)| CastVote {
                voter: voter.to_string(),
                target: VoteTarget::from(*target),
            })
            .collect()
    }

    const FIVE: [&str; 5] = ["Alice", "Bob", "Carol", "Dave", "Eve"];

    #[test]
    fn test_plurality_evicts_crew_member() {
        let votes = votes(&[
            ("Alice", "Carol"),
            ("Bob", "Carol"),
            ("Carol", "continue"),
            ("Dave", "Carol"),
            ("Eve", "continue"),
        ]);
        assert_eq!(
            tally(&votes, 5, &cards(&FIVE, "Eve")),
            Outcome::Eliminate {
                voted_out: "Carol".to_string(),
                was_imposter: false,
                imposter_name: "Eve".to_string(),
            }
        );
    }

    #[test]
    fn test_continue_majority_advances() {
        let votes = votes(&[
            ("Alice", "continue"),
            ("Bob", "continue"),
            ("Carol", "continue"),
            ("Dave", "Bob"),
            ("Eve", "Bob"),
        ]);
        assert_eq!(tally(&votes, 5, &cards(&FIVE, "Carol")), Outcome::Advance);
    }

    #[test]
    fn test_half_continue_is_not_a_majority() {
        let votes = votes(&[
            ("Alice", "continue"),
            ("Bob", "continue"),
            ("Carol", "Dave"),
            ("Dave", "Eve"),
        ]);
        let outcome = tally(&votes, 5, &cards(&FIVE, "Carol"));
        // Tie between Dave and Eve goes to the first one voted for
        assert_eq!(
            outcome,
            Outcome::Eliminate {
                voted_out: "Dave".to_string(),
                was_imposter: false,
                imposter_name: "Carol".to_string(),
            }
        );
    }

    #[test]
    fn test_imposter_caught() {
        let votes = votes(&[
            ("Alice", "Carol"),
            ("Bob", "Carol"),
            ("Carol", "Alice"),
            ("Dave", "Carol"),
            ("Eve", "continue"),
        ]);
        assert_eq!(
            tally(&votes, 5, &cards(&FIVE, "Carol")),
            Outcome::Eliminate {
                voted_out: "Carol".to_string(),
                was_imposter: true,
                imposter_name: "Carol".to_string(),
            }
        );
    }

    #[test]
    fn test_no_votes_advances() {
        assert_eq!(tally(&[], 5, &cards(&FIVE, "Carol")), Outcome::Advance);
    }

    #[test]
    fn test_later_target_with_more_votes_wins() {
        let votes = votes(&[
            ("Alice", "Bob"),
            ("Bob", "Eve"),
            ("Carol", "Eve"),
        ]);
        match tally(&votes, 5, &cards(&FIVE, "Eve")) {
            Outcome::Eliminate { voted_out, was_imposter, .. } => {
                assert_eq!(voted_out, "Eve");
                assert!(was_imposter);
            }
            other => panic!("expected an elimination, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn tally_is_deterministic_and_targets_a_voted_player(
            picks in proptest::collection::vec(0usize..6, 0..5)
        ) {
            // index 5 means "continue"
            let pairs: Vec<(String, String)> = picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let target = FIVE.get(*pick).map(|s| s.to_string()).unwrap_or_else(|| CONTINUE_VOTE.to_string());
                    (FIVE[i].to_string(), target)
                })
                .collect();
            let cast: Vec<CastVote> = pairs
                .iter()
                .map(|(v, t)| CastVote { voter: v.clone(), target: VoteTarget::from(t.clone()) })
                .collect();
            let player_cards = cards(&FIVE, "Dave");

            let first = tally(&cast, 5, &player_cards);
            prop_assert_eq!(&first, &tally(&cast, 5, &player_cards));

            let continues = cast.iter().filter(|v| v.target == VoteTarget::Continue).count();
            match first {
                Outcome::Advance => prop_assert!(continues * 2 > cast.len() || continues == cast.len()),
                Outcome::Eliminate { voted_out, was_imposter, imposter_name } => {
                    prop_assert!(cast.iter().any(|v| v.target == VoteTarget::Player(voted_out.clone())));
                    prop_assert_eq!(was_imposter, voted_out == "Dave");
                    prop_assert_eq!(imposter_name, "Dave");
                }
            }
        }
    }

    async fn voting_room(state: &AppState) -> Room {
        let room = seeded_room(state, &["Alice", "Bob", "Carol"]).await;
        let room = state.start_game(&room.id, "Alice").await.unwrap();
        describe_all(state, &room, 1).await;
        state
            .advance_to_voting(&room.id, Trigger::Host("Alice".to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_revote_overwrites_in_place() {
        let state = AppState::new();
        let room = voting_room(&state).await;

        state.cast_vote(&room.id, "Alice", "Bob".into()).await.unwrap();
        state.cast_vote(&room.id, "Bob", "Carol".into()).await.unwrap();
        let room = state
            .cast_vote(&room.id, "Alice", VoteTarget::Continue)
            .await
            .unwrap();

        let gs = room.game_state.unwrap();
        assert_eq!(gs.current_votes.len(), 2);
        assert_eq!(gs.current_votes[0].voter, "Alice");
        assert_eq!(gs.current_votes[0].target, VoteTarget::Continue);
        assert_eq!(gs.vote_of("Bob"), Some(&VoteTarget::Player("Carol".to_string())));
    }

    #[tokio::test]
    async fn test_vote_validation() {
        let state = AppState::new();
        let room = seeded_room(&state, &["Alice", "Bob", "Carol"]).await;
        let room = state.start_game(&room.id, "Alice").await.unwrap();

        // Still describing
        let err = state.cast_vote(&room.id, "Alice", "Bob".into()).await.unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));

        describe_all(&state, &room, 1).await;
        state
            .advance_to_voting(&room.id, Trigger::Host("Alice".to_string()))
            .await
            .unwrap();

        let err = state.cast_vote(&room.id, "Alice", "Zed".into()).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        let err = state.cast_vote(&room.id, "Zed", "Bob".into()).await.unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }
}
