//! Connect6 board and turn bookkeeping.
//!
//! Black opens with a single stone, after which each side places two stones
//! per turn. Six or more stones of one colour in a row win.

use crate::game::player::{Player, Winner};
use std::io::{self, Write};

/// Number of aligned stones needed to win.
pub const CONNECT: usize = 6;

/// Default board edge length.
pub const DEFAULT_BOARD_SIZE: usize = 15;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    #[error("position ({row}, {col}) is outside a {size}x{size} board")]
    OutOfBoard { row: usize, col: usize, size: usize },

    #[error("position ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },

    #[error("game is already over")]
    Finished,
}

/// Square board stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Player>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Player::None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Player] {
        &self.cells
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.size, index % self.size)
    }

    pub fn get(&self, row: usize, col: usize) -> Player {
        self.cells[self.index(row, col)]
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&cell| cell != Player::None)
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &cell)| cell == Player::None)
            .map(|(idx, _)| idx)
    }

    pub fn place(&mut self, row: usize, col: usize, player: Player) -> Result<(), GameError> {
        if row >= self.size || col >= self.size {
            return Err(GameError::OutOfBoard {
                row,
                col,
                size: self.size,
            });
        }
        let idx = self.index(row, col);
        if self.cells[idx] != Player::None {
            return Err(GameError::Occupied { row, col });
        }
        self.cells[idx] = player;
        Ok(())
    }

    /// Whether the stone at `(row, col)` completes a line of `CONNECT`.
    pub fn completes_line(&self, row: usize, col: usize) -> bool {
        let player = self.get(row, col);
        if player == Player::None {
            return false;
        }
        DIRECTIONS.iter().any(|&(dr, dc)| {
            1 + self.count_from(row, col, dr, dc, player) + self.count_from(row, col, -dr, -dc, player)
                >= CONNECT
        })
    }

    fn count_from(&self, row: usize, col: usize, dr: isize, dc: isize, player: Player) -> usize {
        let size = self.size as isize;
        let (mut r, mut c) = (row as isize + dr, col as isize + dc);
        let mut count = 0;
        while r >= 0 && r < size && c >= 0 && c < size && self.cells[(r * size + c) as usize] == player {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    /// Render the board the way the interactive mode shows it:
    /// rows are lowercase letters, columns uppercase, `X` black, `O` white.
    pub fn print(&self, writer: &mut dyn Write) -> io::Result<()> {
        let mut header = String::from("0");
        for col in 0..self.size {
            header.push(' ');
            header.push((b'A' + col as u8) as char);
        }
        writeln!(writer, "{}", header)?;

        for row in 0..self.size {
            let mut line = String::new();
            line.push((b'a' + row as u8) as char);
            for col in 0..self.size {
                line.push(' ');
                line.push(match self.get(row, col) {
                    Player::Black => 'X',
                    Player::White => 'O',
                    Player::None => '_',
                });
            }
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }
}

/// Parse a move typed as `<row letter><column letter>`, e.g. `aA` or `dE`.
pub fn parse_position(input: &str, size: usize) -> Option<(usize, usize)> {
    let mut chars = input.trim().chars();
    let row = chars.next()?;
    let col = chars.next()?;
    if chars.next().is_some() || !row.is_ascii_lowercase() || !col.is_ascii_uppercase() {
        return None;
    }
    let row = (row as u8 - b'a') as usize;
    let col = (col as u8 - b'A') as usize;
    (row < size && col < size).then_some((row, col))
}

/// Result of one stone placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub player: Player,
    pub remaining: u8,
    pub position: (usize, usize),
}

/// A Connect6 game in progress.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    turn: Player,
    remaining: u8,
    winner: Option<Winner>,
}

impl Game {
    pub fn new(size: usize) -> Self {
        Self {
            board: Board::new(size),
            turn: Player::Black,
            remaining: 1,
            winner: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Player {
        self.turn
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Place a stone for the side to move and advance the turn.
    pub fn play(&mut self, row: usize, col: usize) -> Result<Placement, GameError> {
        if self.winner.is_some() {
            return Err(GameError::Finished);
        }
        let player = self.turn;
        self.board.place(row, col, player)?;
        self.remaining -= 1;

        let placement = Placement {
            player,
            remaining: self.remaining,
            position: (row, col),
        };

        if self.board.completes_line(row, col) {
            self.winner = Some(Winner::from(player));
        } else if self.board.is_full() {
            self.winner = Some(Winner::Draw);
        }

        if self.remaining == 0 {
            self.remaining = 2;
            self.turn = self.turn.switch();
        }
        Ok(placement)
    }

    /// Side to move after placing one more stone from the current state.
    pub fn next_turn(&self) -> Player {
        if self.remaining <= 1 {
            self.turn.switch()
        } else {
            self.turn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_pattern_one_then_two() {
        let mut game = Game::new(DEFAULT_BOARD_SIZE);
        let movers: Vec<Player> = (0..7)
            .map(|i| game.play(i, 0).unwrap().player)
            .collect();
        assert_eq!(
            movers,
            vec![
                Player::Black,
                Player::White,
                Player::White,
                Player::Black,
                Player::Black,
                Player::White,
                Player::White,
            ]
        );
    }

    #[test]
    fn test_next_turn() {
        let mut game = Game::new(DEFAULT_BOARD_SIZE);
        assert_eq!(game.next_turn(), Player::White);
        game.play(0, 0).unwrap();
        assert_eq!(game.next_turn(), Player::White);
        game.play(1, 0).unwrap();
        assert_eq!(game.next_turn(), Player::Black);
    }

    #[test]
    fn test_place_errors() {
        let mut game = Game::new(7);
        game.play(0, 0).unwrap();
        assert_eq!(game.play(0, 0), Err(GameError::Occupied { row: 0, col: 0 }));
        assert_eq!(
            game.play(7, 0),
            Err(GameError::OutOfBoard { row: 7, col: 0, size: 7 })
        );
    }

    #[test]
    fn test_six_in_a_row_wins() {
        let mut board = Board::new(DEFAULT_BOARD_SIZE);
        for col in 2..7 {
            board.place(4, col, Player::White).unwrap();
            assert!(!board.completes_line(4, col));
        }
        board.place(4, 7, Player::White).unwrap();
        assert!(board.completes_line(4, 7));
        assert!(board.completes_line(4, 2));
    }

    #[test]
    fn test_diagonal_win() {
        let mut board = Board::new(DEFAULT_BOARD_SIZE);
        for i in 0..6 {
            board.place(i + 3, 8 - i, Player::Black).unwrap();
        }
        assert!(board.completes_line(5, 6));
    }

    #[test]
    fn test_game_records_winner() {
        let mut game = Game::new(DEFAULT_BOARD_SIZE);
        // Black: (0,0); White: (5,0),(5,1); Black: (0,1),(0,2); ...
        let moves = [
            (0, 0),
            (5, 0),
            (5, 1),
            (0, 1),
            (0, 2),
            (5, 2),
            (5, 3),
            (0, 3),
            (0, 4),
            (5, 4),
            (5, 5),
        ];
        for &(row, col) in &moves {
            game.play(row, col).unwrap();
        }
        assert_eq!(game.winner(), Some(Winner::White));
        assert_eq!(game.play(9, 9), Err(GameError::Finished));
    }

    #[test]
    fn test_full_board_is_draw() {
        // On a 2x2 board no line can be completed.
        let mut game = Game::new(2);
        for idx in 0..4 {
            game.play(idx / 2, idx % 2).unwrap();
        }
        assert_eq!(game.winner(), Some(Winner::Draw));
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("aA", 15), Some((0, 0)));
        assert_eq!(parse_position(" dE\n", 15), Some((3, 4)));
        assert_eq!(parse_position("Aa", 15), None);
        assert_eq!(parse_position("pA", 15), None);
        assert_eq!(parse_position("aAb", 15), None);
    }

    #[test]
    fn test_print() {
        let mut board = Board::new(3);
        board.place(0, 1, Player::Black).unwrap();
        board.place(2, 2, Player::White).unwrap();
        let mut out = Vec::new();
        board.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "0 A B C\na _ X _\nb _ _ _\nc _ _ O\n");
    }
}
