//! WebSocket protocol messages.
//!
//! Every message travels in an envelope `{type, data, timestamp, messageId}`.
//! Outbound messages are a serde-tagged enum. Inbound messages are decoded by
//! hand from the `type` field so that the server's alternate type names are
//! accepted and unknown types survive as [`InboundMessage::Unrecognized`].

use crate::error::TransportError;
use carcassonne_core::{BotDifficulty, PlayerColor};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OutboundMessage {
    /// Authenticate right after the socket opens
    Connect {
        player_id: String,
        name: String,
        color: PlayerColor,
    },

    /// Request room list
    ListRooms {},

    /// Create a new game room
    CreateRoom { room_name: String, max_players: u8 },

    /// Join an existing room
    JoinRoom { room_id: String },

    /// Leave a room
    LeaveRoom { room_id: String },

    /// Fill a seat with a server-side bot
    AddBot {
        bot_name: String,
        difficulty: BotDifficulty,
    },

    /// Start the game (host only)
    #[serde(rename = "GAME_START")]
    StartGame {},

    /// Put the current tile down
    PlaceTile { position: WirePosition, rotation: u8 },

    /// Claim a feature slot on the tile just placed
    PlaceMeeple { feature_id: usize },

    /// Keepalive
    Ping {},
}

/// An outbound message stamped for sending.
///
/// Built once per message; a queued message keeps its original stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub message: OutboundMessage,
    /// ISO-8601 creation time
    pub timestamp: String,
    pub message_id: String,
}

impl Envelope {
    pub fn new(message: OutboundMessage) -> Self {
        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            message,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            message_id: format!("msg-{}-{}", now.timestamp_millis(), &suffix[..9]),
        }
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Handshake accepted
    Connected(Value),
    /// Open rooms
    RoomsList(Vec<Value>),
    /// We are now in a room
    RoomJoined(RoomInfo),
    /// Someone joined or left our room
    RoomUpdate(RoomInfo),
    /// Game started in our room
    GameStart(RoomInfo),
    /// A new turn began
    TurnStart(TurnStart),
    /// Verdict on our tile placement
    TilePlaced(MoveResult),
    /// Verdict on our meeple placement
    MeeplePlaced(MoveResult),
    /// Turn passed on
    TurnEnd(TurnEnd),
    /// Game finished
    GameEnd(GameEnd),
    /// Full authoritative snapshot
    GameState(Box<WireGameState>),
    /// Server-side failure
    Error(ServerError),
    /// Heartbeat answer
    Pong,
    /// A type this client does not know
    Unrecognized { kind: String, data: Value },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, TransportError> {
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };
    Ok(serde_json::from_value(data)?)
}

impl InboundMessage {
    /// Decode one frame produced by the frame parser
    pub fn from_frame(frame: Value) -> Result<Self, TransportError> {
        let RawEnvelope { kind, data } = serde_json::from_value(frame)?;

        let message = match kind.as_str() {
            "CONNECTED" => InboundMessage::Connected(data),
            "ROOMS_LIST" | "LIST_ROOMS" => InboundMessage::RoomsList(rooms_from(data)),
            "ROOM_JOINED" => InboundMessage::RoomJoined(payload(data)?),
            "ROOM_UPDATE" | "ROOM_STATE" => InboundMessage::RoomUpdate(payload(data)?),
            "GAME_START" | "GAME_STARTED" => InboundMessage::GameStart(payload(data)?),
            "TURN_START" => InboundMessage::TurnStart(payload(data)?),
            "TILE_PLACED" => InboundMessage::TilePlaced(payload(data)?),
            "MEEPLE_PLACED" => InboundMessage::MeeplePlaced(payload(data)?),
            "TURN_END" => InboundMessage::TurnEnd(payload(data)?),
            "GAME_END" => InboundMessage::GameEnd(payload(data)?),
            "GAME_STATE" => {
                // Snapshot normally sits under `gameState`
                let snapshot = match data {
                    Value::Object(mut map) if map.contains_key("gameState") => {
                        map.remove("gameState").unwrap_or_default()
                    }
                    other => other,
                };
                InboundMessage::GameState(Box::new(payload(snapshot)?))
            }
            "ERROR" => InboundMessage::Error(payload(data)?),
            "PONG" => InboundMessage::Pong,
            _ => InboundMessage::Unrecognized { kind, data },
        };

        Ok(message)
    }
}

/// Room list may arrive as `{rooms: [...]}` or as a bare array
fn rooms_from(data: Value) -> Vec<Value> {
    match data {
        Value::Array(rooms) => rooms,
        Value::Object(mut map) => match map.remove("rooms") {
            Some(Value::Array(rooms)) => rooms,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// A player as the server names them: seat number or opaque id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerRef {
    Seat(u8),
    Id(String),
}

impl Default for PlayerRef {
    fn default() -> Self {
        PlayerRef::Seat(0)
    }
}

/// Room membership
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomInfo {
    pub room_id: Option<String>,
    pub players: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStart {
    pub current_player: PlayerRef,
    #[serde(default)]
    pub current_tile: Option<WireTile>,
    #[serde(default)]
    pub valid_placements: Vec<WirePosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnEnd {
    pub next_player: PlayerRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnd {
    #[serde(default)]
    pub winner: Option<PlayerRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}

impl From<ServerError> for TransportError {
    fn from(err: ServerError) -> Self {
        let code = err.code.map(|code| match code {
            Value::String(s) => s,
            other => other.to_string(),
        });
        TransportError::Server {
            message: err.message,
            code,
        }
    }
}

// ==================== Wire schema ====================

/// Edge terrain as spelled on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireBorder {
    City,
    Road,
    #[default]
    Field,
}

/// Position relative to the server's board centre
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WirePosition {
    pub x: i32,
    pub y: i32,
}

/// Tile identity with its unrotated borders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTile {
    /// Letter code, `A` = 0
    pub id: u8,
    #[serde(default)]
    pub north: WireBorder,
    #[serde(default)]
    pub east: WireBorder,
    #[serde(default)]
    pub south: WireBorder,
    #[serde(default)]
    pub west: WireBorder,
    #[serde(default)]
    pub features: Vec<Value>,
    #[serde(default)]
    pub has_monastery: bool,
    #[serde(default)]
    pub has_shield: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMeeple {
    pub player_id: PlayerRef,
    #[serde(default)]
    pub feature_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlacedTile {
    pub tile: WireTile,
    #[serde(default)]
    pub position: Option<WirePosition>,
    #[serde(default)]
    pub rotation: u8,
    #[serde(default)]
    pub meeples: Vec<WireMeeple>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlayer {
    pub id: PlayerRef,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub meeples_remaining: Option<u32>,
}

/// Full game snapshot, tiles keyed by `"x,y"` in wire coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireGameState {
    pub tiles: BTreeMap<String, WirePlacedTile>,
    pub current_tile: Option<WireTile>,
    pub players: Vec<WirePlayer>,
    pub current_player: PlayerRef,
    pub game_started: bool,
    pub game_ended: bool,
    pub scores: BTreeMap<String, u32>,
    pub tiles_left: u32,
}
