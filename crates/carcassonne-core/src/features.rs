//! Feature slots and meeple attachment.
//!
//! Each tile identity has a fixed list of feature slots: points in tile-local
//! space (origin at the tile centre, `col` to the right, `row` downwards)
//! tagged with the class of feature a meeple standing there would claim.
//! Slots rotate with the tile. Meeples are stored by slot index, since one
//! tile can expose several slots of the same class.

use crate::board::{Board, Meeple};
use crate::catalog::{Border, TileId};
use crate::game::GameError;
use crate::grid::{Position, Rotation};
use crate::player::Player;
use serde::{Deserialize, Serialize};

/// Kind of feature a meeple can claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureClass {
    Road,
    City,
    Field,
    Monastery,
}

impl FeatureClass {
    /// All classes, in the order they are offered to the player
    pub const ALL: [FeatureClass; 4] = [
        FeatureClass::Road,
        FeatureClass::City,
        FeatureClass::Field,
        FeatureClass::Monastery,
    ];

    /// Border type backing this class. Monasteries are not edge features.
    pub const fn border(self) -> Option<Border> {
        match self {
            FeatureClass::Road => Some(Border::Road),
            FeatureClass::City => Some(Border::City),
            FeatureClass::Field => Some(Border::Field),
            FeatureClass::Monastery => None,
        }
    }
}

/// Point in tile-local space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub col: i32,
    pub row: i32,
}

impl Offset {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

/// A place on a tile where a meeple may stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSlot {
    pub offset: Offset,
    pub class: FeatureClass,
}

const fn slot(col: i32, row: i32, class: FeatureClass) -> FeatureSlot {
    FeatureSlot {
        offset: Offset::new(col, row),
        class,
    }
}

use FeatureClass::{City, Field, Monastery, Road};

const SLOTS_A: &[FeatureSlot] = &[slot(0, 0, Monastery), slot(20, -20, Field), slot(0, 25, Road)];
const SLOTS_B: &[FeatureSlot] = &[slot(0, 0, Monastery), slot(20, -20, Field)];
const SLOTS_C: &[FeatureSlot] = &[slot(0, 0, City)];
const SLOTS_D: &[FeatureSlot] = &[
    slot(0, -22, City),
    slot(-15, -9, Field),
    slot(15, 16, Field),
    slot(-3, 7, Road),
];
const SLOTS_E: &[FeatureSlot] = &[slot(0, -22, City), slot(0, 10, Field)];
const SLOTS_FG: &[FeatureSlot] = &[slot(0, 0, City), slot(0, -22, Field), slot(0, 26, Field)];
const SLOTS_H: &[FeatureSlot] = &[slot(0, -22, City), slot(0, 22, City), slot(0, 0, Field)];
const SLOTS_I: &[FeatureSlot] = &[slot(0, -22, City), slot(-22, 0, City), slot(5, 5, Field)];
const SLOTS_J: &[FeatureSlot] = &[
    slot(0, -22, City),
    slot(-22, -4, Field),
    slot(22, 22, Field),
    slot(2, 2, Road),
];
const SLOTS_K: &[FeatureSlot] = &[
    slot(0, -22, City),
    slot(22, 10, Field),
    slot(-15, 15, Field),
    slot(7, -2, Road),
];
const SLOTS_L: &[FeatureSlot] = &[
    slot(0, -22, City),
    slot(-25, -15, Field),
    slot(-20, 20, Field),
    slot(20, 20, Field),
    slot(22, 0, Road),
    slot(-22, 0, Road),
    slot(0, 22, Road),
];
const SLOTS_MN: &[FeatureSlot] = &[slot(12, -12, City), slot(-12, 12, Field)];
const SLOTS_OP: &[FeatureSlot] = &[
    slot(-12, -12, City),
    slot(-12, 20, Field),
    slot(22, 22, Field),
    slot(9, 9, Road),
];
const SLOTS_QR: &[FeatureSlot] = &[slot(0, -10, City), slot(0, 22, Field)];
const SLOTS_ST: &[FeatureSlot] = &[
    slot(0, -10, City),
    slot(-15, 23, Field),
    slot(15, 23, Field),
    slot(0, 20, Road),
];
const SLOTS_U: &[FeatureSlot] = &[slot(19, 0, Field), slot(-19, 0, Field), slot(0, 0, Road)];
const SLOTS_V: &[FeatureSlot] = &[slot(10, -10, Field), slot(-20, 17, Field), slot(-10, 5, Road)];
const SLOTS_W: &[FeatureSlot] = &[
    slot(0, -20, Field),
    slot(-22, 20, Field),
    slot(22, 20, Field),
    slot(20, 0, Road),
    slot(-20, 0, Road),
    slot(0, 20, Road),
];
const SLOTS_X: &[FeatureSlot] = &[
    slot(-20, -20, Field),
    slot(20, -20, Field),
    slot(-20, 20, Field),
    slot(20, 20, Field),
    slot(20, 0, Road),
    slot(-20, 0, Road),
    slot(0, 20, Road),
    slot(0, -20, Road),
];

/// Unrotated slots of an identity
fn base_slots(tile: TileId) -> &'static [FeatureSlot] {
    match tile.letter() {
        'A' => SLOTS_A,
        'B' => SLOTS_B,
        'C' => SLOTS_C,
        'D' => SLOTS_D,
        'E' => SLOTS_E,
        'F' | 'G' => SLOTS_FG,
        'H' => SLOTS_H,
        'I' => SLOTS_I,
        'J' => SLOTS_J,
        'K' => SLOTS_K,
        'L' => SLOTS_L,
        'M' | 'N' => SLOTS_MN,
        'O' | 'P' => SLOTS_OP,
        'Q' | 'R' => SLOTS_QR,
        'S' | 'T' => SLOTS_ST,
        'U' => SLOTS_U,
        'V' => SLOTS_V,
        'W' => SLOTS_W,
        'X' => SLOTS_X,
        _ => &[],
    }
}

/// Rotate a point clockwise, one `(col, row) -> (-row, col)` step per quarter
pub fn rotate_feature_offset(offset: Offset, rotation: Rotation) -> Offset {
    (0..rotation.quarters()).fold(offset, |o, _| Offset::new(-o.row, o.col))
}

/// Slots of an identity under a rotation, in table order
pub fn feature_slots(tile: TileId, rotation: Rotation) -> Vec<FeatureSlot> {
    base_slots(tile)
        .iter()
        .map(|s| FeatureSlot {
            offset: rotate_feature_offset(s.offset, rotation),
            class: s.class,
        })
        .collect()
}

/// Index of the first slot of a class, if the identity has one
pub fn slot_for_class(tile: TileId, class: FeatureClass) -> Option<usize> {
    base_slots(tile).iter().position(|s| s.class == class)
}

/// Whether a meeple of a class may go on the tile at a position.
///
/// Road, City and Field need a matching border; a monastery needs a
/// monastery-bearing identity. A tile carries at most one meeple.
pub fn can_attach_meeple(board: &Board, pos: Position, class: FeatureClass) -> bool {
    let Some(placed) = board.get(pos) else {
        return false;
    };
    placed.meeple.is_none() && tile_has_class(placed.tile, class)
}

/// Whether an identity offers a feature of the class under any rotation
pub fn tile_has_class(tile: TileId, class: FeatureClass) -> bool {
    match class.border() {
        Some(border) => tile.borders().contains(&border),
        None => tile.has_monastery(),
    }
}

/// Classes that [`can_attach_meeple`] would accept at a position
pub fn available_meeple_classes(board: &Board, pos: Position) -> Vec<FeatureClass> {
    FeatureClass::ALL
        .into_iter()
        .filter(|&class| can_attach_meeple(board, pos, class))
        .collect()
}

/// Attach one of the player's meeples to the first slot of a class.
///
/// Nothing changes unless the whole attachment succeeds.
pub fn attach_meeple(
    board: &mut Board,
    player: &mut Player,
    pos: Position,
    class: FeatureClass,
) -> Result<Meeple, GameError> {
    if !player.has_meeple() {
        return Err(GameError::MeepleUnavailable);
    }
    let tile = board.get(pos).ok_or(GameError::InvalidPlacement)?.tile;
    let slot = slot_for_class(tile, class).ok_or(GameError::InvalidFeature)?;
    attach_meeple_to_slot(board, player, pos, slot)
}

/// Attach one of the player's meeples to a specific slot
pub fn attach_meeple_to_slot(
    board: &mut Board,
    player: &mut Player,
    pos: Position,
    slot: usize,
) -> Result<Meeple, GameError> {
    if !player.has_meeple() {
        return Err(GameError::MeepleUnavailable);
    }

    let placed = board.get(pos).ok_or(GameError::InvalidPlacement)?;
    if placed.meeple.is_some() {
        return Err(GameError::MeepleUnavailable);
    }
    let class = base_slots(placed.tile)
        .get(slot)
        .map(|s| s.class)
        .ok_or(GameError::InvalidFeature)?;
    if !can_attach_meeple(board, pos, class) {
        return Err(GameError::InvalidFeature);
    }

    let meeple = Meeple {
        player: player.id,
        slot,
        class,
    };
    player.take_meeple();
    if let Some(placed) = board.get_mut(pos) {
        placed.meeple = Some(meeple);
    }
    Ok(meeple)
}
