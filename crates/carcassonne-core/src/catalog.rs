//! Static catalog of tile identities.
//!
//! Each identity is a single letter (`A` through `X`) with four border types
//! listed in `[North, East, South, West]` order before any rotation. The
//! table is fixed at compile time and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terrain type along one edge of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Border {
    City,
    Road,
    Field,
}

/// Borders ordered `[North, East, South, West]`
pub type Borders = [Border; 4];

/// A letter that is not part of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unknown tile identity {0:?}")]
pub struct UnknownTile(pub char);

/// Identity of a catalog tile.
///
/// Always one of the letters present in the catalog, so lookups through
/// [`TileId::definition`] cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct TileId(char);

impl TileId {
    /// Look up a letter, rejecting identities outside the catalog
    pub fn new(letter: char) -> Result<Self, UnknownTile> {
        if TILES.iter().any(|t| t.id.0 == letter) {
            Ok(TileId(letter))
        } else {
            Err(UnknownTile(letter))
        }
    }

    /// Numeric code used on the wire (`A` = 0, `B` = 1, ...)
    pub fn code(self) -> u8 {
        self.0 as u8 - b'A'
    }

    /// Inverse of [`TileId::code`]
    pub fn from_code(code: u8) -> Result<Self, UnknownTile> {
        let letter = char::from(b'A'.saturating_add(code));
        TileId::new(letter)
    }

    /// The identity letter
    pub fn letter(self) -> char {
        self.0
    }

    /// The catalog entry for this identity
    pub fn definition(self) -> &'static TileDefinition {
        // Identities are validated on construction and the table is in letter order
        &TILES[self.code() as usize]
    }

    /// Unrotated borders of this identity
    pub fn borders(self) -> Borders {
        self.definition().borders
    }

    /// Whether this identity carries a monastery
    pub fn has_monastery(self) -> bool {
        self.definition().monastery
    }
}

impl TryFrom<char> for TileId {
    type Error = UnknownTile;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        TileId::new(letter)
    }
}

impl From<TileId> for char {
    fn from(id: TileId) -> Self {
        id.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDefinition {
    pub id: TileId,
    /// Borders before rotation
    pub borders: Borders,
    /// Monastery-bearing identities accept a monastery meeple
    pub monastery: bool,
}

const fn tile(letter: char, borders: Borders, monastery: bool) -> TileDefinition {
    TileDefinition {
        id: TileId(letter),
        borders,
        monastery,
    }
}

use Border::{City as C, Field as F, Road as R};

/// The full catalog, in letter order
static TILES: [TileDefinition; 24] = [
    tile('A', [F, F, R, F], true),
    tile('B', [F, F, F, F], true),
    tile('C', [C, C, C, C], false),
    tile('D', [C, R, F, R], false),
    tile('E', [C, F, F, F], false),
    tile('F', [F, C, F, C], false),
    tile('G', [F, C, F, C], false),
    tile('H', [C, F, C, F], false),
    tile('I', [C, F, F, C], false),
    tile('J', [C, R, R, F], false),
    tile('K', [C, F, R, R], false),
    tile('L', [C, R, R, R], false),
    tile('M', [C, C, F, F], false),
    tile('N', [C, C, F, F], false),
    tile('O', [C, R, R, C], false),
    tile('P', [C, R, R, C], false),
    tile('Q', [C, C, F, C], false),
    tile('R', [C, C, F, C], false),
    tile('S', [C, C, R, C], false),
    tile('T', [C, C, R, C], false),
    tile('U', [R, F, R, F], false),
    tile('V', [F, F, R, R], false),
    tile('W', [F, R, R, R], false),
    tile('X', [R, R, R, R], false),
];

/// The tile placed at the board centre before the first turn
pub const START_TILE: TileId = TileId('D');

/// Every catalog entry, in letter order
pub fn all() -> &'static [TileDefinition] {
    &TILES
}

/// How many copies of an identity go into the standard deck
pub fn copies_in_deck(id: TileId) -> usize {
    match id.letter() {
        'D' => 0, // start tile is already on the board
        'A' | 'B' => 5,
        'X' => 1,
        _ => 3,
    }
}

/// Unshuffled standard deck (start tile excluded)
pub fn standard_deck() -> Vec<TileId> {
    TILES
        .iter()
        .flat_map(|t| std::iter::repeat(t.id).take(copies_in_deck(t.id)))
        .collect()
}
