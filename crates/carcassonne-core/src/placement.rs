//! Tile placement rules.
//!
//! A tile may go on an empty cell that touches the placed area, provided
//! every edge it shares with an existing tile carries the same border type on
//! both sides. Open edges (no neighbour) impose nothing.
//!
//! Searching is two-phase: [`possible_placements`] reports positions only,
//! and [`valid_rotations`] is asked again once a position has been chosen.

use crate::board::Board;
use crate::catalog::{Borders, TileId};
use crate::grid::{Direction, Position, Rotation};
use std::collections::BTreeSet;

/// Rotate a border tuple clockwise: `rotated[i] = original[(i - r + 4) % 4]`
pub fn rotate_borders(borders: Borders, rotation: Rotation) -> Borders {
    let r = rotation.quarters() as usize;
    std::array::from_fn(|i| borders[(i + 4 - r) % 4])
}

/// Check whether a tile with already-rotated borders may occupy a cell
pub fn can_place(board: &Board, pos: Position, rotated: &Borders) -> bool {
    if !board.in_bounds(pos) || board.is_occupied(pos) {
        return false;
    }

    // Once anything is on the board, new tiles must touch it
    if !board.is_empty() && !board.has_occupied_neighbor(pos) {
        return false;
    }

    Direction::ALL.iter().all(|&dir| match board.get(pos.neighbor(dir)) {
        Some(neighbor) => rotated[dir.index()] == neighbor.borders[dir.opposite().index()],
        None => true,
    })
}

/// Rotations, in ascending order, under which a tile fits a cell
pub fn valid_rotations(board: &Board, pos: Position, tile: TileId) -> Vec<Rotation> {
    let borders = tile.borders();
    Rotation::ALL
        .into_iter()
        .filter(|&r| can_place(board, pos, &rotate_borders(borders, r)))
        .collect()
}

/// Every empty cell where the tile fits under at least one rotation.
///
/// Only the frontier can satisfy the adjacency rule once a tile is down, so
/// only it is scanned. On an empty board every in-bounds cell qualifies.
pub fn possible_placements(board: &Board, tile: TileId) -> BTreeSet<Position> {
    if board.is_empty() {
        return (0..board.size())
            .flat_map(|y| (0..board.size()).map(move |x| Position::new(x, y)))
            .collect();
    }

    let borders = tile.borders();
    let rotations = Rotation::ALL.map(|r| rotate_borders(borders, r));

    board
        .frontier()
        .filter(|&pos| rotations.iter().any(|rotated| can_place(board, pos, rotated)))
        .collect()
}
