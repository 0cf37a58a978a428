//! Computer opponents.
//!
//! This module provides two difficulty levels:
//! - Easy: random legal placement, coin flip for a random meeple
//! - Medium: placements that touch the most tiles, claims cities and monasteries

use crate::actions::GameAction;
use crate::features::{self, FeatureClass};
use crate::game::{GamePhase, GameSession};
use crate::grid::{Position, Rotation};
use crate::player::PlayerId;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Easy,
    Medium,
}

impl FromStr for BotDifficulty {
    type Err = String;

    /// Accepts the serialized names in any letter case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(BotDifficulty::Easy),
            "medium" => Ok(BotDifficulty::Medium),
            other => Err(format!("Unknown bot difficulty {:?}", other)),
        }
    }
}

/// A bot player that can decide on actions
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose this bot's whole turn, or `None` if it is not up
    pub fn choose_action(&mut self, game: &GameSession) -> Option<GameAction> {
        if game.active_player != self.player_id || game.phase != GamePhase::OpponentTurn {
            return None;
        }
        let tile = game.current_tile?;

        let options: Vec<(Position, Rotation)> = game
            .possible_placements()
            .into_iter()
            .flat_map(|pos| game.valid_rotations(pos).into_iter().map(move |r| (pos, r)))
            .collect();
        if options.is_empty() {
            return None;
        }

        let claimable: Vec<FeatureClass> = match game.get_player(self.player_id) {
            Some(p) if p.has_meeple() => FeatureClass::ALL
                .into_iter()
                .filter(|&class| features::tile_has_class(tile, class))
                .collect(),
            _ => Vec::new(),
        };

        let ((position, rotation), meeple) = match self.difficulty {
            BotDifficulty::Easy => self.choose_easy(&options, &claimable),
            BotDifficulty::Medium => self.choose_medium(game, &options, &claimable),
        }?;

        Some(GameAction::OpponentMove {
            position,
            rotation,
            meeple,
        })
    }

    /// Easy: any legal placement, then a meeple half of the time
    fn choose_easy(
        &mut self,
        options: &[(Position, Rotation)],
        claimable: &[FeatureClass],
    ) -> Option<((Position, Rotation), Option<FeatureClass>)> {
        let placement = *options.choose(&mut self.rng)?;
        let meeple = if self.rng.gen_bool(0.5) {
            claimable.choose(&mut self.rng).copied()
        } else {
            None
        };
        Some((placement, meeple))
    }

    /// Medium: most connected placement, meeples only on valuable features
    fn choose_medium(
        &mut self,
        game: &GameSession,
        options: &[(Position, Rotation)],
        claimable: &[FeatureClass],
    ) -> Option<((Position, Rotation), Option<FeatureClass>)> {
        let touching = |pos: Position| {
            pos.neighbors()
                .iter()
                .filter(|(_, n)| game.board.is_occupied(*n))
                .count()
        };

        let best = options.iter().map(|(pos, _)| touching(*pos)).max()?;
        let top: Vec<(Position, Rotation)> = options
            .iter()
            .copied()
            .filter(|(pos, _)| touching(*pos) == best)
            .collect();
        let placement = *top.choose(&mut self.rng)?;

        let meeple = [FeatureClass::Monastery, FeatureClass::City]
            .into_iter()
            .find(|class| claimable.contains(class));
        Some((placement, meeple))
    }
}
