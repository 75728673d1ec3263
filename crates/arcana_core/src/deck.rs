//! crates/arcana_core/src/deck.rs
//!
//! The fixed 78-card tarot deck and the random draw used when the seeker
//! picks cards from the spread.

use rand::seq::index::sample;
use rand::Rng;

use crate::domain::TarotCard;

pub const DECK_SIZE: usize = 78;

const MAJOR_ARCANA: [&str; 22] = [
    "The Fool",
    "The Magician",
    "The High Priestess",
    "The Empress",
    "The Emperor",
    "The Hierophant",
    "The Lovers",
    "The Chariot",
    "Strength",
    "The Hermit",
    "Wheel of Fortune",
    "Justice",
    "The Hanged Man",
    "Death",
    "Temperance",
    "The Devil",
    "The Tower",
    "The Star",
    "The Moon",
    "The Sun",
    "Judgement",
    "The World",
];

const SUITS: [&str; 4] = ["Wands", "Cups", "Swords", "Pentacles"];

const RANKS: [&str; 14] = [
    "Ace", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Page",
    "Knight", "Queen", "King",
];

/// The display name for a deck index. Indices 0..22 are the major arcana;
/// the remainder runs suit-major through the minors.
pub fn card_name(index: u8) -> String {
    let index = index as usize % DECK_SIZE;
    if index < MAJOR_ARCANA.len() {
        MAJOR_ARCANA[index].to_string()
    } else {
        let minor = index - MAJOR_ARCANA.len();
        let suit = SUITS[minor / RANKS.len()];
        let rank = RANKS[minor % RANKS.len()];
        format!("{rank} of {suit}")
    }
}

/// Draws `count` distinct cards from the deck, with an independently
/// randomized reversed flag per card.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<TarotCard> {
    let count = count.min(DECK_SIZE);
    sample(rng, DECK_SIZE, count)
        .into_iter()
        .map(|index| {
            let index = index as u8;
            TarotCard {
                index,
                name: card_name(index),
                reversed: rng.gen_bool(0.5),
                image_url: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_index_has_a_distinct_name() {
        let names: HashSet<String> = (0..DECK_SIZE as u8).map(card_name).collect();
        assert_eq!(names.len(), DECK_SIZE);
    }

    #[test]
    fn minor_arcana_naming() {
        assert_eq!(card_name(0), "The Fool");
        assert_eq!(card_name(21), "The World");
        assert_eq!(card_name(22), "Ace of Wands");
        assert_eq!(card_name(35), "King of Wands");
        assert_eq!(card_name(36), "Ace of Cups");
        assert_eq!(card_name(77), "King of Pentacles");
    }

    #[test]
    fn draws_are_distinct_and_sized() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let cards = draw(&mut rng, 5);
            assert_eq!(cards.len(), 5);
            let indices: HashSet<u8> = cards.iter().map(|c| c.index).collect();
            assert_eq!(indices.len(), 5);
        }
    }

    #[test]
    fn oversized_draw_is_clamped_to_the_deck() {
        let mut rng = rand::thread_rng();
        assert_eq!(draw(&mut rng, 100).len(), DECK_SIZE);
    }
}
