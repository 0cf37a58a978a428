//! Translation between engine types and the wire schema.
//!
//! The server numbers tiles from 0, spells borders in capitals and puts the
//! origin of its coordinate system on the board centre. Everything here is a
//! pure function; each `*_to_wire` has a `*_from_wire` inverse.

use crate::protocol::{
    PlayerRef, WireBorder, WireGameState, WireMeeple, WirePlacedTile, WirePlayer, WirePosition,
    WireTile,
};
use carcassonne_core::{
    features, Board, Border, GameSession, Meeple, PlacedTile, Player, PlayerColor, PlayerId,
    Position, Rotation, TileId, UnknownTile, MEEPLES_PER_PLAYER,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Local cell that the server calls `(0, 0)`
pub const CENTER_OFFSET: i32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Unknown tile code {0}")]
    UnknownTileCode(u8),

    #[error("Bad tile key {0:?}, expected \"x,y\"")]
    BadTileKey(String),

    #[error("Wire position ({x}, {y}) has no local cell")]
    PositionOutOfRange { x: i32, y: i32 },
}

// ==================== Scalars ====================

pub fn tile_to_code(tile: TileId) -> u8 {
    tile.code()
}

pub fn tile_from_code(code: u8) -> Result<TileId, AdapterError> {
    TileId::from_code(code).map_err(|UnknownTile(_)| AdapterError::UnknownTileCode(code))
}

pub fn border_to_wire(border: Border) -> WireBorder {
    match border {
        Border::City => WireBorder::City,
        Border::Road => WireBorder::Road,
        Border::Field => WireBorder::Field,
    }
}

pub fn border_from_wire(border: WireBorder) -> Border {
    match border {
        WireBorder::City => Border::City,
        WireBorder::Road => Border::Road,
        WireBorder::Field => Border::Field,
    }
}

pub fn position_to_wire(pos: Position) -> WirePosition {
    WirePosition {
        x: pos.x.saturating_sub(CENTER_OFFSET),
        y: pos.y.saturating_sub(CENTER_OFFSET),
    }
}

/// `None` when the shifted coordinate does not fit in an `i32`
pub fn position_from_wire(pos: WirePosition) -> Option<Position> {
    Some(Position::new(
        pos.x.checked_add(CENTER_OFFSET)?,
        pos.y.checked_add(CENTER_OFFSET)?,
    ))
}

pub fn rotation_to_wire(rotation: Rotation) -> u8 {
    rotation.quarters()
}

/// Out-of-range values wrap, so `5` is one quarter turn
pub fn rotation_from_wire(quarters: u8) -> Rotation {
    Rotation::new(quarters)
}

/// Quarter turns for a UI angle
pub fn rotation_from_degrees(degrees: i32) -> Rotation {
    Rotation::from_degrees(degrees)
}

// ==================== Tiles ====================

/// Identity with its unrotated borders
pub fn tile_to_wire(tile: TileId) -> WireTile {
    let [north, east, south, west] = tile.borders().map(border_to_wire);
    WireTile {
        id: tile_to_code(tile),
        north,
        east,
        south,
        west,
        features: Vec::new(),
        has_monastery: tile.has_monastery(),
        has_shield: false,
    }
}

/// Only the id is authoritative; borders come from the catalog
pub fn tile_from_wire(tile: &WireTile) -> Result<TileId, AdapterError> {
    tile_from_code(tile.id)
}

fn placed_tile_to_wire(placed: &PlacedTile) -> WirePlacedTile {
    WirePlacedTile {
        tile: tile_to_wire(placed.tile),
        position: Some(position_to_wire(placed.position)),
        rotation: rotation_to_wire(placed.rotation),
        meeples: placed
            .meeple
            .iter()
            .map(|m| WireMeeple {
                player_id: PlayerRef::Seat(m.player),
                feature_id: m.slot,
            })
            .collect(),
    }
}

fn tile_key(pos: WirePosition) -> String {
    format!("{},{}", pos.x, pos.y)
}

fn parse_tile_key(key: &str) -> Result<WirePosition, AdapterError> {
    let bad = || AdapterError::BadTileKey(key.to_string());
    let (x, y) = key.split_once(',').ok_or_else(bad)?;
    Ok(WirePosition {
        x: x.trim().parse().map_err(|_| bad())?,
        y: y.trim().parse().map_err(|_| bad())?,
    })
}

// ==================== Game state ====================

/// Local view of a server snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub board: Board,
    pub current_tile: Option<TileId>,
    pub players: Vec<Player>,
    pub current_player: Option<PlayerId>,
    pub game_started: bool,
    pub game_ended: bool,
    pub tiles_left: u32,
}

/// Serialize a local session in the server's schema
pub fn game_state_to_wire(session: &GameSession) -> WireGameState {
    let tiles = session
        .board
        .tiles()
        .map(|placed| (tile_key(position_to_wire(placed.position)), placed_tile_to_wire(placed)))
        .collect();

    let players = session
        .players
        .iter()
        .map(|p| WirePlayer {
            id: PlayerRef::Seat(p.id),
            name: p.name.clone(),
            color: Some(p.color.as_str().to_string()),
            score: p.score,
            meeples_remaining: Some(p.meeples_remaining),
        })
        .collect();

    let scores = session
        .players
        .iter()
        .map(|p| (p.id.to_string(), p.score))
        .collect();

    WireGameState {
        tiles,
        current_tile: session.current_tile.map(tile_to_wire),
        players,
        current_player: PlayerRef::Seat(session.active_player),
        game_started: true,
        game_ended: session.is_finished(),
        scores,
        tiles_left: session.deck.remaining() as u32,
    }
}

/// Rebuild a local board and player list from a server snapshot.
///
/// Malformed keys and unknown tile codes are errors. Tiles that fall off the
/// board or collide are skipped with a warning, as are meeples on slots the
/// tile does not have.
pub fn game_state_from_wire(
    state: &WireGameState,
    board_size: i32,
) -> Result<GameSnapshot, AdapterError> {
    let mut board = Board::new(board_size);

    for (key, wire) in &state.tiles {
        let wire_pos = match wire.position {
            Some(pos) => pos,
            None => parse_tile_key(key)?,
        };
        let tile = tile_from_wire(&wire.tile)?;
        let Some(position) = position_from_wire(wire_pos) else {
            warn!(%key, "Skipping tile with out-of-range coordinates");
            continue;
        };

        let mut placed = PlacedTile::new(tile, position, rotation_from_wire(wire.rotation));
        placed.meeple = wire
            .meeples
            .first()
            .and_then(|m| meeple_from_wire(tile, m, &state.players));

        if board.insert(placed).is_err() {
            warn!(%key, %position, "Skipping tile outside the board or on an occupied cell");
        }
    }

    let players = players_from_wire(state);
    let current_player = resolve_player(&state.current_player, &state.players);
    let current_tile = state.current_tile.as_ref().map(tile_from_wire).transpose()?;

    Ok(GameSnapshot {
        board,
        current_tile,
        players,
        current_player,
        game_started: state.game_started,
        game_ended: state.game_ended,
        tiles_left: state.tiles_left,
    })
}

fn meeple_from_wire(tile: TileId, meeple: &WireMeeple, players: &[WirePlayer]) -> Option<Meeple> {
    let slots = features::feature_slots(tile, Rotation::NONE);
    let Some(slot) = slots.get(meeple.feature_id) else {
        warn!(tile = %tile, feature_id = meeple.feature_id, "Ignoring meeple on unknown feature");
        return None;
    };
    let Some(player) = resolve_player(&meeple.player_id, players) else {
        warn!(player = ?meeple.player_id, "Ignoring meeple of unknown player");
        return None;
    };
    Some(Meeple {
        player,
        slot: meeple.feature_id,
        class: slot.class,
    })
}

/// Seat of a player reference: its index in the snapshot's player list,
/// falling back to a numeric id
fn resolve_player(player: &PlayerRef, players: &[WirePlayer]) -> Option<PlayerId> {
    if let Some(seat) = players.iter().position(|p| &p.id == player) {
        return PlayerId::try_from(seat).ok();
    }
    match player {
        PlayerRef::Seat(seat) => Some(*seat),
        PlayerRef::Id(id) => id.parse().ok(),
    }
}

fn players_from_wire(state: &WireGameState) -> Vec<Player> {
    state
        .players
        .iter()
        .enumerate()
        .map(|(seat, wire)| {
            let seat = PlayerId::try_from(seat).unwrap_or(PlayerId::MAX);
            let mut player = Player::new(seat, wire.name.clone());
            if let Some(color) = wire
                .color
                .as_deref()
                .and_then(|c| serde_json::from_value::<PlayerColor>(c.into()).ok())
            {
                player.color = color;
            }
            player.meeples_remaining = wire.meeples_remaining.unwrap_or(MEEPLES_PER_PLAYER);

            let key = match &wire.id {
                PlayerRef::Seat(n) => n.to_string(),
                PlayerRef::Id(id) => id.clone(),
            };
            player.score = state.scores.get(&key).copied().unwrap_or(wire.score);
            player
        })
        .collect()
}

/// Tile keys of a snapshot in local coordinates
pub fn tile_positions(tiles: &BTreeMap<String, WirePlacedTile>) -> Result<Vec<Position>, AdapterError> {
    tiles
        .keys()
        .map(|key| {
            let pos = parse_tile_key(key)?;
            position_from_wire(pos).ok_or(AdapterError::PositionOutOfRange { x: pos.x, y: pos.y })
        })
        .collect()
}
