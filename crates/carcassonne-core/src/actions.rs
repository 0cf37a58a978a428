//! Session actions and the events they produce.
//!
//! This module defines every input the turn state machine accepts and the
//! events it emits when an input is applied.

use crate::board::Meeple;
use crate::catalog::TileId;
use crate::features::FeatureClass;
use crate::game::GamePhase;
use crate::grid::{Position, Rotation};
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};

/// All possible actions a player can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Player Turn ====================
    /// Put the current tile down
    ConfirmPlacement {
        position: Position,
        rotation: Rotation,
    },

    // ==================== Meeple Decision ====================
    /// Claim the first slot of a feature class on the tile just placed
    AttachMeeple(FeatureClass),
    /// Claim a specific feature slot on the tile just placed
    AttachMeepleToSlot(usize),
    /// Leave the tile just placed unclaimed
    SkipMeeple,

    // ==================== Opponent Turn ====================
    /// An opponent's whole turn: placement plus optional meeple
    OpponentMove {
        position: Position,
        rotation: Rotation,
        meeple: Option<FeatureClass>,
    },
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A tile was fixed on the board
    TilePlaced {
        player: PlayerId,
        tile: TileId,
        position: Position,
        rotation: Rotation,
    },

    /// A meeple was attached to a placed tile
    MeeplePlaced {
        position: Position,
        meeple: Meeple,
    },

    /// The player declined to place a meeple
    MeepleSkipped { player: PlayerId },

    /// A new current tile was drawn
    TileDrawn { tile: TileId, remaining: usize },

    /// A drawn tile fit nowhere and was thrown away
    TileDiscarded { tile: TileId },

    /// The active player or phase changed
    TurnChanged {
        player: PlayerId,
        phase: GamePhase,
    },

    /// The match ended; `None` is a tie
    GameOver { winner: Option<PlayerId> },
}
