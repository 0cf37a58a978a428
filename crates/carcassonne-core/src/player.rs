//! Player state and meeple supply.

use serde::{Deserialize, Serialize};

/// Player identifier (seat index, 0 is the local player)
pub type PlayerId = u8;

/// Meeples each player starts with
pub const MEEPLES_PER_PLAYER: u32 = 7;

/// Player color for UI rendering and the server handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Black,
}

impl PlayerColor {
    /// Get color for a player index
    pub fn for_player(id: PlayerId) -> Self {
        match id % 5 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::Green,
            3 => PlayerColor::Yellow,
            _ => PlayerColor::Black,
        }
    }

    /// Lowercase name as used by the server
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerColor::Red => "red",
            PlayerColor::Blue => "blue",
            PlayerColor::Green => "green",
            PlayerColor::Yellow => "yellow",
            PlayerColor::Black => "black",
        }
    }
}

/// A player in the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Seat index
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Player color
    pub color: PlayerColor,
    /// Current score
    pub score: u32,
    /// Meeples still in the supply
    pub meeples_remaining: u32,
}

impl Player {
    /// Create a new player with a full meeple supply
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_player(id),
            score: 0,
            meeples_remaining: MEEPLES_PER_PLAYER,
        }
    }

    /// Whether at least one meeple is left
    pub fn has_meeple(&self) -> bool {
        self.meeples_remaining > 0
    }

    /// Take one meeple from the supply. Returns false if none are left.
    pub fn take_meeple(&mut self) -> bool {
        if self.meeples_remaining == 0 {
            return false;
        }
        self.meeples_remaining -= 1;
        true
    }
}
