use serde::{Deserialize, Serialize};

/// Side to move, and the content of a board cell (`None` is an empty cell).
///
/// The numeric encoding (`Black = -1`, `None = 0`, `White = 1`) is the one the
/// policy callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Player {
    Black,
    #[default]
    None,
    White,
}

impl Player {
    pub fn switch(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
            Player::None => Player::None,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Player::Black => -1,
            Player::None => 0,
            Player::White => 1,
        }
    }

    pub fn as_f32(self) -> f32 {
        self.as_i8() as f32
    }

    pub fn from_i8(value: i8) -> Option<Player> {
        match value {
            -1 => Some(Player::Black),
            0 => Some(Player::None),
            1 => Some(Player::White),
            _ => None,
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Player::Black => write!(f, "Black"),
            Player::None => write!(f, "None"),
            Player::White => write!(f, "White"),
        }
    }
}

/// Final result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Black,
    Draw,
    White,
}

impl Winner {
    /// Outcome value seen from `player`: 1 for a win, -1 for a loss, 0 for a draw.
    pub fn value_for(self, player: Player) -> f32 {
        match (self, player) {
            (Winner::Draw, _) | (_, Player::None) => 0.0,
            (Winner::Black, Player::Black) | (Winner::White, Player::White) => 1.0,
            _ => -1.0,
        }
    }
}

impl From<Player> for Winner {
    fn from(player: Player) -> Self {
        match player {
            Player::Black => Winner::Black,
            Player::White => Winner::White,
            Player::None => Winner::Draw,
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Black => write!(f, "Black"),
            Winner::Draw => write!(f, "Draw"),
            Winner::White => write!(f, "White"),
        }
    }
}
