//! Draw pile.
//!
//! The deck is shuffled once when a match starts and never reordered after
//! that. Drawing advances a cursor; the sequence itself is not spliced.

use crate::catalog::{self, TileId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Remaining tiles, drawn front to back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    tiles: Vec<TileId>,
    /// Index of the next tile to draw
    cursor: usize,
}

impl Deck {
    /// Deck that draws `tiles` in the given order
    pub fn new(tiles: Vec<TileId>) -> Self {
        Self { tiles, cursor: 0 }
    }

    /// The standard deck in random order
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut tiles = catalog::standard_deck();
        tiles.shuffle(rng);
        Self::new(tiles)
    }

    /// Take the next tile
    pub fn draw(&mut self) -> Option<TileId> {
        let tile = self.tiles.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(tile)
    }

    /// Tiles not yet drawn
    pub fn remaining(&self) -> usize {
        self.tiles.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_draw_shrinks_by_one() {
        let mut deck = Deck::shuffled(&mut StdRng::seed_from_u64(7));
        assert_eq!(deck.remaining(), 71);

        assert!(deck.draw().is_some());
        assert_eq!(deck.remaining(), 70);
    }

    #[test]
    fn test_draw_until_empty() {
        let a = TileId::new('A').unwrap();
        let x = TileId::new('X').unwrap();
        let mut deck = Deck::new(vec![a, x]);

        assert_eq!(deck.draw(), Some(a));
        assert_eq!(deck.draw(), Some(x));
        assert_eq!(deck.draw(), None);
        assert!(deck.is_empty());
        assert_eq!(deck.remaining(), 0);
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut first = Deck::shuffled(&mut StdRng::seed_from_u64(42));
        let mut second = Deck::shuffled(&mut StdRng::seed_from_u64(42));
        for _ in 0..71 {
            assert_eq!(first.draw(), second.draw());
        }
    }
}
