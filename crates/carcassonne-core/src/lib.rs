//! Carcassonne - tile-laying game engine
//!
//! This crate provides the rules core of a networked Carcassonne client:
//! - Tile catalog and the standard draw pile
//! - Board representation with placed tiles and meeples
//! - Placement legality and placement search
//! - Meeple feature slots and attachment rules
//! - Turn state machine with full rule enforcement
//!
//! # Architecture
//!
//! The engine is synchronous and platform-agnostic. It can be compiled to:
//! - Native Rust for the networked client
//! - WebAssembly for the browser UI
//!
//! # Modules
//!
//! - [`grid`]: Positions, directions and quarter-turn rotations
//! - [`catalog`]: Tile identities and their borders
//! - [`board`]: Placed tiles and the bounded grid
//! - [`placement`]: Border matching and placement search
//! - [`features`]: Feature slots and meeple attachment
//! - [`game`]: Turn state machine

pub mod actions;
pub mod board;
pub mod bot;
pub mod catalog;
pub mod deck;
pub mod features;
pub mod game;
pub mod grid;
pub mod placement;
pub mod player;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{GameAction, GameEvent};
pub use board::{Board, Meeple, PlacedTile, DEFAULT_BOARD_SIZE};
pub use bot::{Bot, BotDifficulty};
pub use catalog::{Border, Borders, TileId, UnknownTile, START_TILE};
pub use deck::Deck;
pub use features::{FeatureClass, FeatureSlot, Offset};
pub use game::{GameConfig, GameError, GamePhase, GameSession, LOCAL_PLAYER};
pub use grid::{Direction, Position, Rotation};
pub use player::{Player, PlayerColor, PlayerId, MEEPLES_PER_PLAYER};
