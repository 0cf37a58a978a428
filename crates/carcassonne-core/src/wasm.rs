//! WebAssembly bindings for the game engine.
//!
//! This module exposes the session and the placement queries to JavaScript
//! through wasm-bindgen. Structured values cross the boundary as JSON.

use wasm_bindgen::prelude::*;

use crate::actions::GameAction;
use crate::bot::{Bot, BotDifficulty};
use crate::catalog::TileId;
use crate::features;
use crate::game::{GameConfig, GameSession};
use crate::grid::{Position, Rotation};

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed session wrapper
#[wasm_bindgen]
pub struct WasmSession {
    session: GameSession,
}

#[wasm_bindgen]
impl WasmSession {
    /// Start a match for the given seat names (JSON array, seat 0 first)
    #[wasm_bindgen(constructor)]
    pub fn new(player_names_json: &str, seed: Option<u64>) -> Result<WasmSession, JsValue> {
        let player_names: Vec<String> = serde_json::from_str(player_names_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid player names: {}", e)))?;

        let config = GameConfig {
            player_names,
            seed,
            ..GameConfig::default()
        };

        Ok(WasmSession {
            session: GameSession::new(config),
        })
    }

    /// Get the full session as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.session).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current phase as JSON
    #[wasm_bindgen(js_name = getPhase)]
    pub fn get_phase(&self) -> String {
        serde_json::to_string(&self.session.phase).unwrap_or_else(|_| "\"Unknown\"".to_string())
    }

    #[wasm_bindgen(js_name = getActivePlayer)]
    pub fn get_active_player(&self) -> u8 {
        self.session.active_player
    }

    /// Letter of the tile waiting to be placed
    #[wasm_bindgen(js_name = getCurrentTile)]
    pub fn get_current_tile(&self) -> Option<char> {
        self.session.current_tile.map(TileId::letter)
    }

    #[wasm_bindgen(js_name = getTilesLeft)]
    pub fn get_tiles_left(&self) -> usize {
        self.session.deck.remaining()
    }

    /// Cells to highlight for the current tile, as `[{x, y}]`
    #[wasm_bindgen(js_name = getPossiblePlacements)]
    pub fn get_possible_placements(&self) -> String {
        let cells: Vec<Position> = self.session.possible_placements().into_iter().collect();
        serde_json::to_string(&cells).unwrap_or_else(|_| "[]".to_string())
    }

    /// Quarter turns that fit the chosen cell
    #[wasm_bindgen(js_name = getValidRotations)]
    pub fn get_valid_rotations(&self, x: i32, y: i32) -> Vec<u8> {
        self.session
            .valid_rotations(Position::new(x, y))
            .into_iter()
            .map(Rotation::quarters)
            .collect()
    }

    /// Classes the active player may claim on the tile just placed
    #[wasm_bindgen(js_name = getAvailableMeepleClasses)]
    pub fn get_available_meeple_classes(&self) -> String {
        serde_json::to_string(&self.session.available_meeple_classes())
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Meeple spots of a tile under a rotation, for drawing
    #[wasm_bindgen(js_name = getFeatureSlots)]
    pub fn get_feature_slots(&self, letter: char, rotation: u8) -> Result<String, JsValue> {
        let tile = TileId::new(letter).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let slots = features::feature_slots(tile, Rotation::new(rotation));
        Ok(serde_json::to_string(&slots).unwrap_or_else(|_| "[]".to_string()))
    }

    /// Apply an action from JSON, returns events JSON or error
    #[wasm_bindgen(js_name = applyAction)]
    pub fn apply_action(&mut self, player: u8, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid action JSON: {}", e)))?;

        match self.session.apply_action(player, action) {
            Ok(events) => Ok(serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())),
            Err(e) => Err(JsValue::from_str(&format!("Action rejected: {}", e))),
        }
    }

    /// Check if the game is finished
    #[wasm_bindgen(js_name = isFinished)]
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// Get the winner (if game is finished and not tied)
    #[wasm_bindgen(js_name = getWinner)]
    pub fn get_winner(&self) -> Option<u8> {
        self.session.winner()
    }

    /// Get a bot's move for the active opponent
    /// difficulty: "Easy" or "Medium"
    #[wasm_bindgen(js_name = getBotAction)]
    pub fn get_bot_action(&self, difficulty: &str) -> String {
        // Unknown names fall back to medium
        let diff = difficulty.parse().unwrap_or(BotDifficulty::Medium);

        let mut bot = Bot::new(self.session.active_player, diff);
        match bot.choose_action(&self.session) {
            Some(action) => serde_json::to_string(&action).unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }
}
