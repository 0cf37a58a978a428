//! Core game state machine.
//!
//! This module contains the main `GameSession` struct and the turn logic:
//! draw, place, optionally claim a feature, hand over to the next player.
//!
//! Every action is validated in full before anything is mutated, so an
//! `Err` from [`GameSession::apply_action`] always leaves the session exactly
//! as it was.

use crate::actions::{GameAction, GameEvent};
use crate::board::{Board, PlacedTile, DEFAULT_BOARD_SIZE};
use crate::catalog::{TileId, UnknownTile};
use crate::deck::Deck;
use crate::features::{self, FeatureClass};
use crate::grid::{Position, Rotation};
use crate::placement;
use crate::player::{Player, PlayerId, MEEPLES_PER_PLAYER};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Seat of the player driving the session locally
pub const LOCAL_PLAYER: PlayerId = 0;

/// Game phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Local player must place the current tile
    PlayerTurn,

    /// Local player may claim a feature on the tile just placed
    MeepleDecision,

    /// An opponent places the current tile
    OpponentTurn,

    /// Match is over
    GameOver {
        /// Highest score, or `None` on a tie
        winner: Option<PlayerId>,
    },
}

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Tile cannot be placed there")]
    InvalidPlacement,

    #[error("No meeple available for that feature")]
    MeepleUnavailable,

    #[error("Tile has no such feature")]
    InvalidFeature,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("No tile has been drawn")]
    NoCurrentTile,

    #[error("Unknown tile identity {0:?}")]
    UnknownTile(char),

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Game is over")]
    GameOver,
}

impl From<UnknownTile> for GameError {
    fn from(err: UnknownTile) -> Self {
        GameError::UnknownTile(err.0)
    }
}

/// Settings for a new match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Side length of the square board
    pub board_size: i32,
    /// One name per seat; seat 0 is the local player
    pub player_names: Vec<String>,
    /// Starting meeple supply
    pub meeples_per_player: u32,
    /// Fixed shuffle seed for reproducible matches
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            player_names: vec!["Player 1".to_string(), "Computer 1".to_string()],
            meeples_per_player: MEEPLES_PER_PLAYER,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// The complete state of one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    /// The game board
    pub board: Board,
    /// Undrawn tiles
    pub deck: Deck,
    /// All players, indexed by seat
    pub players: Vec<Player>,
    /// Drawn tile waiting to be placed
    pub current_tile: Option<TileId>,
    /// Seat whose turn it is
    pub active_player: PlayerId,
    /// Current game phase
    pub phase: GamePhase,
    /// Tile that may receive a meeple, set only during `MeepleDecision`
    pub last_placed: Option<Position>,
    /// Round number (starts at 1, advances when seat 0 is up again)
    pub turn_number: u32,
}

impl GameSession {
    /// Start a match with a freshly shuffled standard deck
    pub fn new(config: GameConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let deck = Deck::shuffled(&mut rng);
        Self::with_deck(config, deck)
    }

    /// Start a match that draws from a prepared deck
    pub fn with_deck(config: GameConfig, deck: Deck) -> Self {
        let names = if config.player_names.is_empty() {
            GameConfig::default().player_names
        } else {
            config.player_names
        };

        let max_seats = usize::from(PlayerId::MAX) + 1;
        if names.len() > max_seats {
            warn!(
                requested = names.len(),
                seats = max_seats,
                "Too many players, extra names ignored"
            );
        }

        // Zipping with the id range stops at the last addressable seat
        let players = (0..=PlayerId::MAX)
            .zip(names)
            .map(|(id, name)| {
                let mut player = Player::new(id, name);
                player.meeples_remaining = config.meeples_per_player;
                player
            })
            .collect();

        let mut session = Self {
            board: Board::with_start_tile(config.board_size),
            deck,
            players,
            current_tile: None,
            active_player: LOCAL_PLAYER,
            phase: GamePhase::PlayerTurn,
            last_placed: None,
            turn_number: 1,
        };

        let mut events = Vec::new();
        session.current_tile = session.draw_playable(&mut events);
        if session.current_tile.is_none() {
            session.finish(&mut events);
        }

        info!(
            players = session.players.len(),
            tiles = session.deck.remaining(),
            "Started game session"
        );
        session
    }

    /// Get the number of players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Get a player by ID
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    /// Check if the game is finished
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver { .. })
    }

    /// Winner of a finished game. `None` while playing or on a tie.
    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            GamePhase::GameOver { winner } => winner,
            _ => None,
        }
    }

    /// Cells where the current tile fits under some rotation
    pub fn possible_placements(&self) -> BTreeSet<Position> {
        match self.current_tile {
            Some(tile) => placement::possible_placements(&self.board, tile),
            None => BTreeSet::new(),
        }
    }

    /// Rotations under which the current tile fits a cell
    pub fn valid_rotations(&self, pos: Position) -> Vec<Rotation> {
        match self.current_tile {
            Some(tile) => placement::valid_rotations(&self.board, pos, tile),
            None => Vec::new(),
        }
    }

    /// Feature classes the active player could claim on the tile just placed
    pub fn available_meeple_classes(&self) -> Vec<FeatureClass> {
        let has_meeple = self
            .get_player(self.active_player)
            .map_or(false, Player::has_meeple);

        match (self.phase == GamePhase::MeepleDecision, self.last_placed) {
            (true, Some(pos)) if has_meeple => features::available_meeple_classes(&self.board, pos),
            _ => Vec::new(),
        }
    }

    /// Apply an action for a player
    pub fn apply_action(
        &mut self,
        player: PlayerId,
        action: GameAction,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if self.get_player(player).is_none() {
            return Err(GameError::UnknownPlayer(player));
        }
        if player != self.active_player {
            return Err(GameError::NotYourTurn);
        }

        let mut events = Vec::new();

        match action {
            GameAction::ConfirmPlacement { position, rotation } => {
                self.require_phase(GamePhase::PlayerTurn)?;
                self.place_current(player, position, rotation, &mut events)?;

                self.phase = GamePhase::MeepleDecision;
                events.push(GameEvent::TurnChanged {
                    player,
                    phase: GamePhase::MeepleDecision,
                });
            }

            GameAction::AttachMeeple(class) => {
                self.require_phase(GamePhase::MeepleDecision)?;
                let pos = self.last_placed.ok_or(GameError::InvalidPhase)?;
                let owner = self
                    .players
                    .get_mut(player as usize)
                    .ok_or(GameError::UnknownPlayer(player))?;

                let meeple = features::attach_meeple(&mut self.board, owner, pos, class)?;
                events.push(GameEvent::MeeplePlaced {
                    position: pos,
                    meeple,
                });
                self.end_turn(&mut events);
            }

            GameAction::AttachMeepleToSlot(slot) => {
                self.require_phase(GamePhase::MeepleDecision)?;
                let pos = self.last_placed.ok_or(GameError::InvalidPhase)?;
                let owner = self
                    .players
                    .get_mut(player as usize)
                    .ok_or(GameError::UnknownPlayer(player))?;

                let meeple = features::attach_meeple_to_slot(&mut self.board, owner, pos, slot)?;
                events.push(GameEvent::MeeplePlaced {
                    position: pos,
                    meeple,
                });
                self.end_turn(&mut events);
            }

            GameAction::SkipMeeple => {
                self.require_phase(GamePhase::MeepleDecision)?;
                events.push(GameEvent::MeepleSkipped { player });
                self.end_turn(&mut events);
            }

            GameAction::OpponentMove {
                position,
                rotation,
                meeple,
            } => {
                self.require_phase(GamePhase::OpponentTurn)?;

                // Check the meeple up front so a bad claim can't leave a placed tile behind
                if let Some(class) = meeple {
                    let tile = self.current_tile.ok_or(GameError::NoCurrentTile)?;
                    if !self.get_player(player).map_or(false, Player::has_meeple) {
                        return Err(GameError::MeepleUnavailable);
                    }
                    if !features::tile_has_class(tile, class) {
                        return Err(GameError::InvalidFeature);
                    }
                }

                self.place_current(player, position, rotation, &mut events)?;

                if let Some(class) = meeple {
                    let owner = self
                        .players
                        .get_mut(player as usize)
                        .ok_or(GameError::UnknownPlayer(player))?;
                    let meeple = features::attach_meeple(&mut self.board, owner, position, class)?;
                    events.push(GameEvent::MeeplePlaced { position, meeple });
                }
                self.end_turn(&mut events);
            }
        }

        Ok(events)
    }

    // ==================== Helper Methods ====================

    fn require_phase(&self, phase: GamePhase) -> Result<(), GameError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(GameError::InvalidPhase)
        }
    }

    /// Fix the current tile on the board and draw its successor
    fn place_current(
        &mut self,
        player: PlayerId,
        position: Position,
        rotation: Rotation,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let tile = self.current_tile.ok_or(GameError::NoCurrentTile)?;
        let rotated = placement::rotate_borders(tile.borders(), rotation);
        if !placement::can_place(&self.board, position, &rotated) {
            debug!(%position, tile = %tile, "Rejected placement");
            return Err(GameError::InvalidPlacement);
        }

        self.board
            .insert(PlacedTile::new(tile, position, rotation))?;
        self.last_placed = Some(position);
        events.push(GameEvent::TilePlaced {
            player,
            tile,
            position,
            rotation,
        });

        self.current_tile = self.draw_playable(events);
        Ok(())
    }

    /// Draw until a tile fits somewhere, discarding the ones that don't
    fn draw_playable(&mut self, events: &mut Vec<GameEvent>) -> Option<TileId> {
        while let Some(tile) = self.deck.draw() {
            if placement::possible_placements(&self.board, tile).is_empty() {
                debug!(tile = %tile, "Discarding unplaceable tile");
                events.push(GameEvent::TileDiscarded { tile });
                continue;
            }
            events.push(GameEvent::TileDrawn {
                tile,
                remaining: self.deck.remaining(),
            });
            return Some(tile);
        }
        None
    }

    /// Hand over to the next seat, or end the game if nothing is left to draw
    fn end_turn(&mut self, events: &mut Vec<GameEvent>) {
        self.last_placed = None;

        if self.current_tile.is_none() {
            self.finish(events);
            return;
        }

        let next = (usize::from(self.active_player) + 1) % self.player_count();
        let next = PlayerId::try_from(next).unwrap_or(LOCAL_PLAYER);
        let phase = if next == LOCAL_PLAYER {
            self.turn_number += 1;
            GamePhase::PlayerTurn
        } else {
            GamePhase::OpponentTurn
        };

        self.active_player = next;
        self.phase = phase.clone();
        events.push(GameEvent::TurnChanged {
            player: next,
            phase,
        });
    }

    fn finish(&mut self, events: &mut Vec<GameEvent>) {
        let winner = self.leader();
        self.phase = GamePhase::GameOver { winner };
        self.last_placed = None;
        info!(?winner, placed = self.board.placed_count(), "Game over");
        events.push(GameEvent::GameOver { winner });
    }

    /// Sole holder of the highest score
    fn leader(&self) -> Option<PlayerId> {
        let best = self.players.iter().map(|p| p.score).max()?;
        let mut top = self.players.iter().filter(|p| p.score == best);
        match (top.next(), top.next()) {
            (Some(player), None) => Some(player.id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Direction;
    use pretty_assertions::assert_eq;

    fn tile(letter: char) -> TileId {
        TileId::new(letter).unwrap()
    }

    fn small_config(board_size: i32) -> GameConfig {
        GameConfig {
            board_size,
            ..GameConfig::default()
        }
    }

    fn snapshot(session: &GameSession) -> String {
        serde_json::to_string(session).unwrap()
    }

    /// Place the current tile at the first legal spot
    fn place_anywhere(session: &mut GameSession, player: PlayerId) -> Vec<GameEvent> {
        let pos = *session.possible_placements().iter().next().unwrap();
        let rotation = session.valid_rotations(pos)[0];
        let action = match session.phase {
            GamePhase::OpponentTurn => GameAction::OpponentMove {
                position: pos,
                rotation,
                meeple: None,
            },
            _ => GameAction::ConfirmPlacement {
                position: pos,
                rotation,
            },
        };
        session.apply_action(player, action).unwrap()
    }

    #[test]
    fn test_new_session_starts_on_player_turn() {
        let session = GameSession::new(GameConfig::default().with_seed(1));
        assert_eq!(session.phase, GamePhase::PlayerTurn);
        assert_eq!(session.active_player, LOCAL_PLAYER);
        assert!(session.current_tile.is_some());
        assert_eq!(session.board.placed_count(), 1);
        assert_eq!(session.players.len(), 2);
        assert!(!session.possible_placements().is_empty());
    }

    #[test]
    fn test_seats_limited_to_player_id_range() {
        let config = GameConfig {
            player_names: (0..300).map(|i| format!("Player {}", i)).collect(),
            ..GameConfig::default().with_seed(3)
        };
        let session = GameSession::new(config);

        assert_eq!(session.player_count(), 256);
        assert!(session
            .players
            .iter()
            .enumerate()
            .all(|(seat, p)| usize::from(p.id) == seat));
        assert_eq!(session.players[255].name, "Player 255");

        // Last seat hands over to seat 0
        let mut session = session;
        session.active_player = 255;
        session.phase = GamePhase::MeepleDecision;
        session.apply_action(255, GameAction::SkipMeeple).unwrap();
        assert_eq!(session.active_player, LOCAL_PLAYER);
        assert_eq!(session.phase, GamePhase::PlayerTurn);
    }

    #[test]
    fn test_same_seed_same_session() {
        let a = GameSession::new(GameConfig::default().with_seed(9));
        let b = GameSession::new(GameConfig::default().with_seed(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_confirm_placement_moves_to_meeple_decision() {
        let mut session = GameSession::new(GameConfig::default().with_seed(3));
        let before = session.deck.remaining();

        let events = place_anywhere(&mut session, LOCAL_PLAYER);

        assert_eq!(session.phase, GamePhase::MeepleDecision);
        assert_eq!(session.board.placed_count(), 2);
        assert!(session.last_placed.is_some());
        assert!(before - session.deck.remaining() >= 1);
        assert!(matches!(events[0], GameEvent::TilePlaced { .. }));
    }

    #[test]
    fn test_illegal_placement_leaves_session_untouched() {
        let mut session = GameSession::with_deck(small_config(5), Deck::new(vec![tile('C'), tile('B')]));
        let before = snapshot(&session);
        let center = session.board.center();

        // All-city tile against the start tile's Field south edge
        let result = session.apply_action(
            LOCAL_PLAYER,
            GameAction::ConfirmPlacement {
                position: center.neighbor(Direction::South),
                rotation: Rotation::NONE,
            },
        );
        assert_eq!(result, Err(GameError::InvalidPlacement));
        assert_eq!(snapshot(&session), before);

        // Occupied cell
        let result = session.apply_action(
            LOCAL_PLAYER,
            GameAction::ConfirmPlacement {
                position: center,
                rotation: Rotation::NONE,
            },
        );
        assert_eq!(result, Err(GameError::InvalidPlacement));
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_out_of_phase_and_out_of_turn_rejected() {
        let mut session = GameSession::new(GameConfig::default().with_seed(5));
        let before = snapshot(&session);

        assert_eq!(
            session.apply_action(LOCAL_PLAYER, GameAction::SkipMeeple),
            Err(GameError::InvalidPhase)
        );
        assert_eq!(
            session.apply_action(1, GameAction::SkipMeeple),
            Err(GameError::NotYourTurn)
        );
        assert_eq!(
            session.apply_action(7, GameAction::SkipMeeple),
            Err(GameError::UnknownPlayer(7))
        );
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_attach_meeple_without_supply_is_noop() {
        let mut session = GameSession::new(GameConfig::default().with_seed(11));
        place_anywhere(&mut session, LOCAL_PLAYER);
        session.players[0].meeples_remaining = 0;
        let before = snapshot(&session);

        for class in FeatureClass::ALL {
            assert_eq!(
                session.apply_action(LOCAL_PLAYER, GameAction::AttachMeeple(class)),
                Err(GameError::MeepleUnavailable)
            );
        }
        assert_eq!(snapshot(&session), before);
        assert!(session.available_meeple_classes().is_empty());
    }

    #[test]
    fn test_attach_meeple_then_opponent_turn() {
        let mut session = GameSession::with_deck(
            small_config(7),
            Deck::new(vec![tile('B'), tile('B'), tile('B')]),
        );
        let below = session.board.center().neighbor(Direction::South);

        session
            .apply_action(
                LOCAL_PLAYER,
                GameAction::ConfirmPlacement {
                    position: below,
                    rotation: Rotation::NONE,
                },
            )
            .unwrap();
        assert_eq!(
            session.available_meeple_classes(),
            vec![FeatureClass::Field, FeatureClass::Monastery]
        );

        let events = session
            .apply_action(LOCAL_PLAYER, GameAction::AttachMeeple(FeatureClass::Monastery))
            .unwrap();

        assert_eq!(session.players[0].meeples_remaining, MEEPLES_PER_PLAYER - 1);
        let meeple = session.board.get(below).unwrap().meeple.unwrap();
        assert_eq!(meeple.slot, 0);
        assert_eq!(meeple.player, LOCAL_PLAYER);
        assert_eq!(session.phase, GamePhase::OpponentTurn);
        assert_eq!(session.active_player, 1);
        assert_eq!(session.last_placed, None);
        assert_eq!(
            events.last(),
            Some(&GameEvent::TurnChanged {
                player: 1,
                phase: GamePhase::OpponentTurn
            })
        );
    }

    #[test]
    fn test_opponent_move_returns_to_player() {
        let mut session = GameSession::new(GameConfig::default().with_seed(21));
        place_anywhere(&mut session, LOCAL_PLAYER);
        session.apply_action(LOCAL_PLAYER, GameAction::SkipMeeple).unwrap();

        place_anywhere(&mut session, 1);
        assert_eq!(session.phase, GamePhase::PlayerTurn);
        assert_eq!(session.active_player, LOCAL_PLAYER);
        assert_eq!(session.turn_number, 2);
        assert_eq!(session.board.placed_count(), 3);
    }

    #[test]
    fn test_opponent_invalid_meeple_leaves_session_untouched() {
        let mut session = GameSession::with_deck(
            small_config(7),
            Deck::new(vec![tile('B'), tile('C'), tile('B')]),
        );
        place_anywhere(&mut session, LOCAL_PLAYER);
        session.apply_action(LOCAL_PLAYER, GameAction::SkipMeeple).unwrap();
        assert_eq!(session.current_tile, Some(tile('C')));

        let before = snapshot(&session);
        let pos = *session.possible_placements().iter().next().unwrap();
        let rotation = session.valid_rotations(pos)[0];
        let result = session.apply_action(
            1,
            GameAction::OpponentMove {
                position: pos,
                rotation,
                meeple: Some(FeatureClass::Road),
            },
        );
        assert_eq!(result, Err(GameError::InvalidFeature));
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_multiple_opponents_in_seat_order() {
        let config = GameConfig {
            player_names: vec!["Player 1".into(), "Computer 1".into(), "Computer 2".into()],
            ..GameConfig::default().with_seed(8)
        };
        let mut session = GameSession::new(config);

        place_anywhere(&mut session, 0);
        session.apply_action(0, GameAction::SkipMeeple).unwrap();
        assert_eq!((session.active_player, &session.phase), (1, &GamePhase::OpponentTurn));

        place_anywhere(&mut session, 1);
        assert_eq!((session.active_player, &session.phase), (2, &GamePhase::OpponentTurn));

        place_anywhere(&mut session, 2);
        assert_eq!((session.active_player, &session.phase), (0, &GamePhase::PlayerTurn));
    }

    #[test]
    fn test_game_over_when_deck_runs_out() {
        let mut session = GameSession::with_deck(small_config(7), Deck::new(vec![tile('B'), tile('B')]));

        place_anywhere(&mut session, LOCAL_PLAYER);
        assert_eq!(session.deck.remaining(), 0);
        assert!(session.current_tile.is_some());
        session.apply_action(LOCAL_PLAYER, GameAction::SkipMeeple).unwrap();

        let events = place_anywhere(&mut session, 1);
        assert_eq!(session.phase, GamePhase::GameOver { winner: None });
        assert_eq!(events.last(), Some(&GameEvent::GameOver { winner: None }));

        // Terminal: nothing else is accepted
        let before = snapshot(&session);
        assert_eq!(
            session.apply_action(1, GameAction::SkipMeeple),
            Err(GameError::GameOver)
        );
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_winner_by_score() {
        let mut session = GameSession::with_deck(small_config(7), Deck::new(vec![tile('B'), tile('B')]));
        session.players[1].score = 12;
        session.players[0].score = 4;

        place_anywhere(&mut session, LOCAL_PLAYER);
        session.apply_action(LOCAL_PLAYER, GameAction::SkipMeeple).unwrap();
        place_anywhere(&mut session, 1);

        assert_eq!(session.winner(), Some(1));
    }

    #[test]
    fn test_unplaceable_tile_is_discarded() {
        // 2x2 board: D sits at (1, 1) with only (1, 0) and (0, 1) reachable
        let mut session = GameSession::with_deck(
            small_config(2),
            Deck::new(vec![tile('C'), tile('B'), tile('X')]),
        );
        assert_eq!(session.current_tile, Some(tile('C')));

        let events = session
            .apply_action(
                LOCAL_PLAYER,
                GameAction::ConfirmPlacement {
                    position: Position::new(1, 0),
                    rotation: Rotation::NONE,
                },
            )
            .unwrap();

        assert!(events.contains(&GameEvent::TileDiscarded { tile: tile('B') }));
        assert!(events.contains(&GameEvent::TileDrawn {
            tile: tile('X'),
            remaining: 0
        }));
        assert_eq!(session.current_tile, Some(tile('X')));
    }

    #[test]
    fn test_nothing_placeable_ends_game_immediately() {
        let session = GameSession::with_deck(small_config(1), Deck::new(vec![tile('A'), tile('X')]));
        assert!(session.is_finished());
        assert_eq!(session.current_tile, None);
        assert_eq!(session.deck.remaining(), 0);
    }
}
