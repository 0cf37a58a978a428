//! Game board representation.
//!
//! This module contains:
//! - Placed tiles with their cached post-rotation borders
//! - Meeples attached to placed tiles
//! - The bounded board grid with its centre cell and placement counter
//! - The frontier of empty cells touching the placed area

use crate::catalog::{Borders, TileId, START_TILE};
use crate::features::FeatureClass;
use crate::game::GameError;
use crate::grid::{Position, Rotation};
use crate::placement::rotate_borders;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Side length of the standard board. The centre (50, 50) matches the
/// coordinate origin used by the server.
pub const DEFAULT_BOARD_SIZE: i32 = 100;

/// A player's marker on one feature slot of a placed tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeple {
    /// Owning player
    pub player: PlayerId,
    /// Index into the tile's feature slots
    pub slot: usize,
    /// Class of the occupied feature
    pub class: FeatureClass,
}

/// A tile fixed on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTile {
    /// Catalog identity
    pub tile: TileId,
    /// Cell the tile occupies
    pub position: Position,
    /// Rotation applied when the tile was placed
    pub rotation: Rotation,
    /// Borders after rotation, `[North, East, South, West]`
    pub borders: Borders,
    /// At most one meeple per tile
    pub meeple: Option<Meeple>,
}

impl PlacedTile {
    /// Create a tile, deriving its rotated borders from the catalog
    pub fn new(tile: TileId, position: Position, rotation: Rotation) -> Self {
        Self {
            tile,
            position,
            rotation,
            borders: rotate_borders(tile.borders(), rotation),
            meeple: None,
        }
    }
}

/// The bounded square board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    size: i32,
    /// Row-major cells, `size * size` long
    cells: Vec<Option<PlacedTile>>,
    center: Position,
    placed_count: usize,
    /// Empty in-bounds cells with at least one occupied neighbour
    frontier: BTreeSet<Position>,
}

impl Board {
    /// Create an empty board of `size * size` cells
    pub fn new(size: i32) -> Self {
        let size = size.max(1);
        Self {
            size,
            cells: vec![None; (size * size) as usize],
            center: Position::new(size / 2, size / 2),
            placed_count: 0,
            frontier: BTreeSet::new(),
        }
    }

    /// Create a board with the start tile at its centre
    pub fn with_start_tile(size: i32) -> Self {
        let mut board = Board::new(size);
        let center = board.center;
        let idx = board.index(center);
        board.cells[idx] = Some(PlacedTile::new(START_TILE, center, Rotation::NONE));
        board.placed_count = 1;
        board.extend_frontier(center);
        board
    }

    /// Standard board with the start tile in place
    pub fn standard() -> Self {
        Self::with_start_tile(DEFAULT_BOARD_SIZE)
    }

    /// Side length
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Cell holding the first tile
    pub fn center(&self) -> Position {
        self.center
    }

    /// Number of tiles on the board
    pub fn placed_count(&self) -> usize {
        self.placed_count
    }

    /// Whether no tile has been placed yet
    pub fn is_empty(&self) -> bool {
        self.placed_count == 0
    }

    /// Whether a position lies on the board
    pub fn in_bounds(&self, pos: Position) -> bool {
        (0..self.size).contains(&pos.x) && (0..self.size).contains(&pos.y)
    }

    fn index(&self, pos: Position) -> usize {
        (pos.y * self.size + pos.x) as usize
    }

    /// The tile at a position, if any
    pub fn get(&self, pos: Position) -> Option<&PlacedTile> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells[self.index(pos)].as_ref()
    }

    pub(crate) fn get_mut(&mut self, pos: Position) -> Option<&mut PlacedTile> {
        if !self.in_bounds(pos) {
            return None;
        }
        let idx = self.index(pos);
        self.cells[idx].as_mut()
    }

    /// Whether a tile occupies a position
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.get(pos).is_some()
    }

    /// Whether any 4-connected neighbour is occupied
    pub fn has_occupied_neighbor(&self, pos: Position) -> bool {
        pos.neighbors().iter().any(|(_, n)| self.is_occupied(*n))
    }

    /// Empty cells adjacent to the placed area
    pub fn frontier(&self) -> impl Iterator<Item = Position> + '_ {
        self.frontier.iter().copied()
    }

    /// All placed tiles in row-major order
    pub fn tiles(&self) -> impl Iterator<Item = &PlacedTile> {
        self.cells.iter().flatten()
    }

    /// Put a tile into its cell.
    ///
    /// Only bounds and vacancy are checked here; border matching is the job
    /// of [`crate::placement::can_place`]. Snapshots from the server go
    /// through this directly.
    pub fn insert(&mut self, tile: PlacedTile) -> Result<(), GameError> {
        let pos = tile.position;
        if !self.in_bounds(pos) || self.is_occupied(pos) {
            return Err(GameError::InvalidPlacement);
        }
        let idx = self.index(pos);
        self.cells[idx] = Some(tile);
        self.placed_count += 1;
        self.extend_frontier(pos);
        Ok(())
    }

    fn extend_frontier(&mut self, placed: Position) {
        self.frontier.remove(&placed);
        for (_, n) in placed.neighbors() {
            if self.in_bounds(n) && !self.is_occupied(n) {
                self.frontier.insert(n);
            }
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Border;

    fn tile(letter: char) -> TileId {
        TileId::new(letter).unwrap()
    }

    #[test]
    fn test_standard_board_has_start_tile_at_center() {
        let board = Board::standard();
        assert_eq!(board.center(), Position::new(50, 50));
        assert_eq!(board.placed_count(), 1);

        let start = board.get(board.center()).unwrap();
        assert_eq!(start.tile, START_TILE);
        assert_eq!(start.rotation, Rotation::NONE);
        assert!(start.meeple.is_none());
    }

    #[test]
    fn test_odd_sized_board_center() {
        let board = Board::new(7);
        assert_eq!(board.center(), Position::new(3, 3));
        assert!(board.is_empty());
    }

    #[test]
    fn test_placed_tile_caches_rotated_borders() {
        let placed = PlacedTile::new(tile('E'), Position::new(1, 1), Rotation::QUARTER);
        assert_eq!(
            placed.borders,
            [Border::Field, Border::City, Border::Field, Border::Field]
        );
    }

    #[test]
    fn test_out_of_bounds_lookups() {
        let board = Board::with_start_tile(5);
        assert!(board.get(Position::new(-1, 0)).is_none());
        assert!(board.get(Position::new(0, 5)).is_none());
        assert!(!board.in_bounds(Position::new(5, 5)));
    }

    #[test]
    fn test_insert_rejects_occupied_and_out_of_bounds() {
        let mut board = Board::with_start_tile(5);
        let center = board.center();

        let clash = PlacedTile::new(tile('A'), center, Rotation::NONE);
        assert_eq!(board.insert(clash), Err(GameError::InvalidPlacement));

        let outside = PlacedTile::new(tile('A'), Position::new(9, 9), Rotation::NONE);
        assert_eq!(board.insert(outside), Err(GameError::InvalidPlacement));
        assert_eq!(board.placed_count(), 1);
    }

    #[test]
    fn test_frontier_tracks_neighbors() {
        let mut board = Board::with_start_tile(5);
        let center = board.center();
        let frontier: Vec<Position> = board.frontier().collect();
        assert_eq!(frontier.len(), 4);

        let east = center.neighbor(crate::grid::Direction::East);
        board
            .insert(PlacedTile::new(tile('U'), east, Rotation::NONE))
            .unwrap();

        let frontier: BTreeSet<Position> = board.frontier().collect();
        assert!(!frontier.contains(&east));
        assert!(!frontier.contains(&center));
        // centre's other three sides plus east tile's three free sides
        assert_eq!(frontier.len(), 6);
    }

    #[test]
    fn test_frontier_skips_cells_outside_board() {
        let mut board = Board::new(3);
        board
            .insert(PlacedTile::new(tile('B'), Position::new(0, 0), Rotation::NONE))
            .unwrap();
        let frontier: Vec<Position> = board.frontier().collect();
        assert_eq!(frontier, vec![Position::new(0, 1), Position::new(1, 0)]);
    }
}
