//! Card catalog
//!
//! The deck a round's secret card is drawn from. Loaded once at startup and
//! immutable for the lifetime of the process.

use rand::Rng;
use std::collections::HashSet;
use std::path::Path;

use crate::types::Card;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read card catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse card catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid card catalog: {0}")]
    Invalid(String),
}

/// Ordered, non-empty list of cards
#[derive(Debug, Clone)]
pub struct CardCatalog {
    cards: Vec<Card>,
}

impl CardCatalog {
    pub fn new(cards: Vec<Card>) -> Result<Self, CatalogError> {
        if cards.is_empty() {
            return Err(CatalogError::Invalid("deck is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for card in &cards {
            if !seen.insert(card.id) {
                return Err(CatalogError::Invalid(format!("duplicate card id {}", card.id)));
            }
            if card.name.trim().is_empty() {
                return Err(CatalogError::Invalid(format!("card {} has no name", card.id)));
            }
            let has_face = card.emoji.as_deref().is_some_and(|e| !e.trim().is_empty())
                || card.image_url.as_deref().is_some_and(|u| !u.trim().is_empty());
            if !has_face {
                return Err(CatalogError::Invalid(format!(
                    "card {} needs an emoji or an image_url",
                    card.id
                )));
            }
        }

        Ok(Self { cards })
    }

    /// Load a JSON array of cards
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cards: Vec<Card> = serde_json::from_str(&raw)?;
        Self::new(cards)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Draw one card uniformly at random
    pub fn draw<R: Rng>(&self, rng: &mut R) -> &Card {
        &self.cards[rng.random_range(0..self.cards.len())]
    }
}

impl Default for CardCatalog {
    fn default() -> Self {
        let deck = [
            (1, "Apple", "🍎"),
            (2, "Banana", "🍌"),
            (3, "Cat", "🐱"),
            (4, "Dog", "🐕"),
            (5, "Car", "🚗"),
            (6, "Tree", "🌳"),
            (7, "Beach", "🏖️"),
            (8, "Pizza", "🍕"),
        ];
        Self {
            cards: deck
                .into_iter()
                .map(|(id, name, emoji)| Card {
                    id,
                    name: name.to_string(),
                    emoji: Some(emoji.to_string()),
                    image_url: None,
                })
                .collect(),
        }
    }
}
