pub mod board;
pub mod player;
pub mod record;

pub use board::{Board, Game, GameError, Placement, CONNECT, DEFAULT_BOARD_SIZE};
pub use player::{Player, Winner};
pub use record::{GameRecord, MoveSample};
