//! Square grid coordinates, compass directions and quarter-turn rotations.
//!
//! This module provides the foundational coordinate types for the tile board:
//! - `Position`: Identifies a cell of the bounded board (absolute indices)
//! - `Direction`: The four compass edges of a cell, in border order
//! - `Rotation`: Clockwise quarter turns applied to a tile
//!
//! `x` grows to the east (right) and `y` grows to the south (down), so the
//! neighbour "above" a cell is at `y - 1`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four edges of a cell, in the order tiles list their borders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in border order (clockwise starting from North)
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Index of this edge inside a `[North, East, South, West]` tuple
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// The edge facing this one on the neighbouring cell
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Grid delta `(dx, dy)` for a single step in this direction
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// Absolute cell coordinate on the bounded board.
///
/// Signed so that neighbours of edge cells can be expressed (and rejected
/// as out of bounds) without wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Create a new position
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in a direction
    pub const fn neighbor(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    /// The four 4-connected neighbours, in border order
    pub fn neighbors(self) -> [(Direction, Position); 4] {
        Direction::ALL.map(|dir| (dir, self.neighbor(dir)))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Clockwise quarter turns, always normalised to `0..=3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(from = "u8", into = "u8")]
pub struct Rotation(u8);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);
    pub const QUARTER: Rotation = Rotation(1);
    pub const HALF: Rotation = Rotation(2);
    pub const THREE_QUARTERS: Rotation = Rotation(3);

    /// All rotations in ascending order
    pub const ALL: [Rotation; 4] = [
        Rotation::NONE,
        Rotation::QUARTER,
        Rotation::HALF,
        Rotation::THREE_QUARTERS,
    ];

    /// Create a rotation from any number of quarter turns (taken modulo 4)
    pub const fn new(quarters: u8) -> Self {
        Self(quarters % 4)
    }

    /// Number of clockwise quarter turns (`0..=3`)
    pub const fn quarters(self) -> u8 {
        self.0
    }

    /// Compose two rotations
    pub const fn then(self, other: Rotation) -> Rotation {
        Rotation::new(self.0 + other.0)
    }

    /// The rotation that undoes this one
    pub const fn inverse(self) -> Rotation {
        Rotation::new(4 - self.0)
    }

    /// Rotation expressed in degrees (0, 90, 180 or 270)
    pub const fn degrees(self) -> u16 {
        self.0 as u16 * 90
    }

    /// Quarter turns for a degree value: `floor(degrees / 90) mod 4`
    pub fn from_degrees(degrees: i32) -> Self {
        // div_euclid floors toward negative infinity, so -90 maps to three quarters
        Rotation(degrees.div_euclid(90).rem_euclid(4) as u8)
    }
}

impl From<u8> for Rotation {
    fn from(quarters: u8) -> Self {
        Rotation::new(quarters)
    }
}

impl From<Rotation> for u8 {
    fn from(rotation: Rotation) -> Self {
        rotation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_directions() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.opposite().index(), (dir.index() + 2) % 4);
        }
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let pos = Position::new(5, 5);
        let neighbors = pos.neighbors();
        assert_eq!(neighbors[0], (Direction::North, Position::new(5, 4)));
        assert_eq!(neighbors[1], (Direction::East, Position::new(6, 5)));
        assert_eq!(neighbors[2], (Direction::South, Position::new(5, 6)));
        assert_eq!(neighbors[3], (Direction::West, Position::new(4, 5)));
    }

    #[test]
    fn test_rotation_normalises() {
        assert_eq!(Rotation::new(5), Rotation::QUARTER);
        assert_eq!(Rotation::new(4), Rotation::NONE);
        assert_eq!(Rotation::HALF.then(Rotation::THREE_QUARTERS), Rotation::QUARTER);
    }

    #[test]
    fn test_rotation_inverse() {
        for r in Rotation::ALL {
            assert_eq!(r.then(r.inverse()), Rotation::NONE);
        }
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::from_degrees(0), Rotation::NONE);
        assert_eq!(Rotation::from_degrees(90), Rotation::QUARTER);
        assert_eq!(Rotation::from_degrees(135), Rotation::QUARTER);
        assert_eq!(Rotation::from_degrees(270), Rotation::THREE_QUARTERS);
        assert_eq!(Rotation::from_degrees(360), Rotation::NONE);
        assert_eq!(Rotation::from_degrees(-90), Rotation::THREE_QUARTERS);
        assert_eq!(Rotation::HALF.degrees(), 180);
    }

    #[test]
    fn test_rotation_serializes_as_quarters() {
        let json = serde_json::to_string(&Rotation::THREE_QUARTERS).unwrap();
        assert_eq!(json, "3");
        let back: Rotation = serde_json::from_str("6").unwrap();
        assert_eq!(back, Rotation::HALF);
    }
}
