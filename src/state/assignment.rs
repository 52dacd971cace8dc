use rand::Rng;

use crate::catalog::CardCatalog;
use crate::error::GameError;
use crate::types::*;

/// Deal cards for a new game: one secret card shared by everyone except a
/// single uniformly chosen imposter.
pub fn assign<R: Rng>(
    players: &[Player],
    catalog: &CardCatalog,
    rng: &mut R,
) -> Result<GameState, GameError> {
    if players.is_empty() {
        return Err(GameError::Precondition(
            "Cannot deal cards without players".to_string(),
        ));
    }

    let secret_card = catalog.draw(rng).clone();
    let imposter_index = rng.random_range(0..players.len());

    let player_cards = players
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let is_imposter = i == imposter_index;
            PlayerCard {
                player_id: p.id.clone(),
                player_name: p.name.clone(),
                card: (!is_imposter).then(|| secret_card.clone()),
                is_imposter,
            }
        })
        .collect();

    Ok(GameState {
        secret_card: Some(secret_card),
        player_cards,
        round: 1,
        descriptions: Vec::new(),
        current_votes: Vec::new(),
        voting_active: false,
        result: None,
        phase_deadline: None,
    })
}
