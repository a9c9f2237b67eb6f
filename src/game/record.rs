//! Game records produced by self-play.

use crate::game::player::{Player, Winner};
use serde::{Deserialize, Serialize};

/// One move of a finished game: who moved, the board they saw, where they played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSample {
    pub player: Player,
    /// Board state before the move, row-major.
    pub board: Vec<Player>,
    /// Zero-indexed `(row, col)`.
    pub position: (usize, usize),
}

impl MoveSample {
    pub fn flat_position(&self, board_size: usize) -> usize {
        self.position.0 * board_size + self.position.1
    }
}

/// Complete record of a game. Immutable once an engine returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub winner: Winner,
    pub moves: Vec<MoveSample>,
}

impl GameRecord {
    pub fn new(winner: Winner, moves: Vec<MoveSample>) -> Self {
        Self { winner, moves }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
