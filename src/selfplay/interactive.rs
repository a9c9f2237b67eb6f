//! A game between the policy and a human over any reader/writer pair.
//!
//! The policy plays Black, the human plays White and types each stone as a
//! row letter followed by a column letter (`aA` is the top-left cell).

use std::io::{BufRead, Write};

use crate::config::SelfPlayParams;
use crate::game::{board::parse_position, Game, GameRecord, MoveSample, Player, Winner};
use crate::neural::policy::PolicyCallback;
use crate::selfplay::engine::{search, EngineError, PolicyGuidedEngine};

impl PolicyGuidedEngine {
    pub fn play_with<R: BufRead, W: Write>(
        &self,
        policy: &PolicyCallback<'_>,
        params: &SelfPlayParams,
        mut input: R,
        mut output: W,
    ) -> Result<GameRecord, EngineError> {
        let mut rng = self.next_rng();
        let mut game = Game::new(policy.board_size());
        let mut moves = Vec::new();
        let mut line = String::new();

        while !game.is_over() {
            writeln!(output, "{} - remain {}", game.turn(), game.remaining())?;
            game.board().print(&mut output)?;

            let (row, col) = if game.turn() == Player::Black {
                let index = search(&game, policy, params, &mut rng)?;
                game.board().position(index)
            } else {
                line.clear();
                if input.read_line(&mut line)? == 0 {
                    return Err(EngineError::InputClosed);
                }
                match parse_position(&line, game.board().size()) {
                    Some(position) => position,
                    None => {
                        writeln!(output, "invalid input, retry")?;
                        continue;
                    }
                }
            };

            let board = game.board().cells().to_vec();
            let player = game.turn();
            if let Err(e) = game.play(row, col) {
                writeln!(output, "{}, retry", e)?;
                continue;
            }
            moves.push(MoveSample {
                player,
                board,
                position: (row, col),
            });
        }

        let winner = game.winner().unwrap_or(Winner::Draw);
        game.board().print(&mut output)?;
        writeln!(output, "winner: {}", winner)?;
        Ok(GameRecord::new(winner, moves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::policy::{Evaluation, Evaluator, PolicyError};
    use std::io::Cursor;

    /// Prefers the first row for Black so the human can lose quickly.
    struct FirstRow;

    impl Evaluator for FirstRow {
        fn evaluate(&self, _turn: Player, boards: &[Vec<Player>]) -> Result<Evaluation, PolicyError> {
            let row: Vec<f32> = (0..36).map(|i| if i < 6 { 1.0 } else { 1e-3 }).collect();
            Ok(Evaluation {
                values: vec![0.0; boards.len()],
                policy: vec![row; boards.len()],
            })
        }

        fn board_size(&self) -> usize {
            6
        }
    }

    fn params() -> SelfPlayParams {
        SelfPlayParams {
            num_simulation: 1,
            epsilon: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_human_moves_are_recorded() {
        let callback = PolicyCallback::new(&FirstRow);
        let engine = PolicyGuidedEngine::with_seed(1);
        let input = "fA\nfB\nfC\nfD\nfE\nfF\n".repeat(3);
        let mut output = Vec::new();

        let record = engine
            .play_with(&callback, &params(), Cursor::new(input), &mut output)
            .unwrap();

        let white: Vec<(usize, usize)> = record
            .moves
            .iter()
            .filter(|m| m.player == Player::White)
            .map(|m| m.position)
            .collect();
        assert!(!white.is_empty());
        assert!(white.iter().all(|&(row, _)| row == 5));
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("winner:"));
    }

    #[test]
    fn test_invalid_input_is_retried_and_eof_aborts() {
        let callback = PolicyCallback::new(&FirstRow);
        let engine = PolicyGuidedEngine::with_seed(1);
        let mut output = Vec::new();

        let result = engine.play_with(&callback, &params(), Cursor::new("zz\n"), &mut output);
        assert!(matches!(result, Err(EngineError::InputClosed)));
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("invalid input, retry"));
    }
}
