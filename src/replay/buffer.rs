use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::VecDeque;

use crate::game::{GameRecord, Player};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("cannot sample {requested} entries from a buffer holding {available}")]
    Capacity { requested: usize, available: usize },

    #[error("move {index} does not fit a {board_size}x{board_size} board: {reason}")]
    Shape {
        index: usize,
        board_size: usize,
        reason: String,
    },
}

/// One training-ready move: outcome for the mover, the board they saw,
/// and the flattened cell they chose.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub player: Player,
    pub value: f32,
    pub board: Vec<Player>,
    pub position: usize,
}

/// Parallel arrays drawn from the buffer for one gradient step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    pub players: Vec<Player>,
    pub values: Vec<f32>,
    pub boards: Vec<Vec<Player>>,
    pub positions: Vec<usize>,
}

impl SampleBatch {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fixed-capacity FIFO store of flattened move samples.
///
/// Insertion order drives eviction: once a push overflows `max_size`, the
/// oldest entries are dropped until exactly `max_size` remain.
pub struct ReplayBuffer {
    entries: VecDeque<ReplayEntry>,
    max_size: usize,
    board_size: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub fn new(max_size: usize, board_size: usize) -> Self {
        Self::with_rng(max_size, board_size, StdRng::seed_from_u64(rand::random()))
    }

    pub fn with_seed(max_size: usize, board_size: usize, seed: u64) -> Self {
        Self::with_rng(max_size, board_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_size: usize, board_size: usize, rng: StdRng) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
            board_size,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ReplayEntry> {
        self.entries.iter()
    }

    /// Append every move of `record`, then evict the oldest overflow.
    /// Returns the number of entries appended.
    ///
    /// The whole record is checked first; a record with any malformed move
    /// is rejected without touching the buffer.
    pub fn push_game(&mut self, record: &GameRecord) -> Result<usize, BufferError> {
        self.check_record(record)?;
        for sample in &record.moves {
            self.entries.push_back(ReplayEntry {
                player: sample.player,
                value: record.winner.value_for(sample.player),
                board: sample.board.clone(),
                position: sample.flat_position(self.board_size),
            });
        }

        if self.entries.len() > self.max_size {
            let overflow = self.entries.len() - self.max_size;
            self.entries.drain(..overflow);
        }
        Ok(record.moves.len())
    }

    fn check_record(&self, record: &GameRecord) -> Result<(), BufferError> {
        let capacity = self.board_size * self.board_size;
        for (index, sample) in record.moves.iter().enumerate() {
            let reason = if sample.board.len() != capacity {
                format!("board has {} cells, expected {}", sample.board.len(), capacity)
            } else if sample.position.0 >= self.board_size || sample.position.1 >= self.board_size {
                format!("position {:?} is off the board", sample.position)
            } else {
                continue;
            };
            return Err(BufferError::Shape {
                index,
                board_size: self.board_size,
                reason,
            });
        }
        Ok(())
    }

    /// Draw `n` distinct entries uniformly at random.
    pub fn sample(&mut self, n: usize) -> Result<SampleBatch, BufferError> {
        if n > self.entries.len() {
            return Err(BufferError::Capacity {
                requested: n,
                available: self.entries.len(),
            });
        }

        let mut batch = SampleBatch {
            players: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            boards: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
        };
        for i in index::sample(&mut self.rng, self.entries.len(), n).iter() {
            let entry = &self.entries[i];
            batch.players.push(entry.player);
            batch.values.push(entry.value);
            batch.boards.push(entry.board.clone());
            batch.positions.push(entry.position);
        }
        Ok(batch)
    }

    /// Drop the oldest `len / 2` entries, keeping the newer half.
    pub fn clear_half(&mut self) {
        let half = self.entries.len() / 2;
        self.entries.drain(..half);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MoveSample, Winner};

    const SIZE: usize = 3;
    const WIDE: usize = 10;

    /// Empty `WIDE` board whose move flattens to `tag`.
    fn wide_sample(player: Player, tag: usize) -> MoveSample {
        MoveSample {
            player,
            board: vec![Player::None; WIDE * WIDE],
            position: (tag / WIDE, tag % WIDE),
        }
    }

    /// A game whose moves are tagged by their flattened position so that
    /// entries can be traced back to insertion order.
    fn tagged_game(first_tag: usize, moves: usize, winner: Winner) -> GameRecord {
        let samples = (0..moves)
            .map(|i| {
                let tag = (first_tag + i) % (SIZE * SIZE);
                MoveSample {
                    player: if i % 2 == 0 { Player::Black } else { Player::White },
                    board: vec![Player::None; SIZE * SIZE],
                    position: (tag / SIZE, tag % SIZE),
                }
            })
            .collect();
        GameRecord::new(winner, samples)
    }

    fn game_with_boards(tags: std::ops::Range<usize>) -> GameRecord {
        // Encode the tag into the board so it survives sampling.
        let samples = tags
            .map(|tag| {
                let mut board = vec![Player::None; SIZE * SIZE];
                board[0] = Player::from_i8((tag % 3) as i8 - 1).unwrap();
                MoveSample {
                    player: Player::Black,
                    board,
                    position: (tag / SIZE % SIZE, tag % SIZE),
                }
            })
            .collect();
        GameRecord::new(Winner::Black, samples)
    }

    #[test]
    fn test_push_len_is_min_of_capacity_and_total() {
        let mut buffer = ReplayBuffer::with_seed(10, SIZE, 7);
        let mut expected = 0;
        for moves in [0, 3, 4, 6, 1] {
            buffer.push_game(&tagged_game(0, moves, Winner::Draw)).unwrap();
            expected = (expected + moves).min(10);
            assert_eq!(buffer.len(), expected);
        }
    }

    #[test]
    fn test_thirteen_moves_into_ten_evicts_three_oldest() {
        let mut buffer = ReplayBuffer::with_seed(10, SIZE, 7);
        buffer.push_game(&tagged_game(0, 4, Winner::Black)).unwrap();
        buffer.push_game(&tagged_game(4, 5, Winner::White)).unwrap();
        buffer.push_game(&tagged_game(9, 4, Winner::Draw)).unwrap();

        assert_eq!(buffer.len(), 10);
        let positions: Vec<usize> = buffer.iter().map(|e| e.position).collect();
        let expected: Vec<usize> = (3..13).map(|tag| tag % (SIZE * SIZE)).collect();
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_contents_are_most_recent_in_order() {
        let mut buffer = ReplayBuffer::with_seed(5, WIDE, 1);
        let mut inserted = Vec::new();
        let mut next = 0;
        for moves in [2, 3, 4, 1, 7] {
            let samples = (next..next + moves)
                .map(|tag| wide_sample(Player::White, tag))
                .collect();
            buffer.push_game(&GameRecord::new(Winner::White, samples)).unwrap();
            inserted.extend(next..next + moves);
            next += moves;
        }
        let kept: Vec<usize> = buffer.iter().map(|e| e.position).collect();
        assert_eq!(kept, inserted[inserted.len() - 5..].to_vec());
    }

    #[test]
    fn test_entry_value_is_outcome_for_mover() {
        let mut buffer = ReplayBuffer::with_seed(10, SIZE, 1);
        buffer.push_game(&tagged_game(0, 2, Winner::White)).unwrap();
        let values: Vec<(Player, f32)> = buffer.iter().map(|e| (e.player, e.value)).collect();
        assert_eq!(values, vec![(Player::Black, -1.0), (Player::White, 1.0)]);
    }

    #[test]
    fn test_sample_distinct_entries() {
        let mut buffer = ReplayBuffer::with_seed(50, WIDE, 3);
        let samples = (0..50).map(|tag| wide_sample(Player::Black, tag)).collect();
        buffer.push_game(&GameRecord::new(Winner::Draw, samples)).unwrap();

        let batch = buffer.sample(20).unwrap();
        assert_eq!(batch.len(), 20);
        let mut positions = batch.positions.clone();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), 20);

        let full = buffer.sample(50).unwrap();
        let mut all = full.positions;
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_keeps_arrays_parallel() {
        let mut buffer = ReplayBuffer::with_seed(20, SIZE, 9);
        buffer.push_game(&game_with_boards(0..9)).unwrap();
        let batch = buffer.sample(9).unwrap();
        for (board, &position) in batch.boards.iter().zip(&batch.positions) {
            assert_eq!(board[0].as_i8(), (position % 3) as i8 - 1);
        }
        assert_eq!(batch.players.len(), 9);
        assert_eq!(batch.values.len(), 9);
    }

    #[test]
    fn test_sample_is_roughly_uniform() {
        let mut buffer = ReplayBuffer::with_seed(10, WIDE, 42);
        let samples = (0..10).map(|tag| wide_sample(Player::Black, tag)).collect();
        buffer.push_game(&GameRecord::new(Winner::Draw, samples)).unwrap();

        let trials = 20_000;
        let mut counts = [0usize; 10];
        for _ in 0..trials {
            for position in buffer.sample(3).unwrap().positions {
                counts[position] += 1;
            }
        }
        // Each position is expected 3/10 of the trials.
        let expected = trials as f64 * 0.3;
        for &count in &counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "counts {:?} not uniform", counts);
        }
    }

    #[test]
    fn test_sample_over_capacity_fails() {
        let mut buffer = ReplayBuffer::with_seed(10, SIZE, 1);
        buffer.push_game(&tagged_game(0, 4, Winner::Draw)).unwrap();
        assert_eq!(
            buffer.sample(5),
            Err(BufferError::Capacity {
                requested: 5,
                available: 4
            })
        );
        assert!(buffer.sample(4).is_ok());
    }

    #[test]
    fn test_clear_half_even() {
        let mut buffer = ReplayBuffer::with_seed(20, SIZE, 1);
        buffer.push_game(&tagged_game(0, 8, Winner::Draw)).unwrap();
        buffer.clear_half();
        assert_eq!(buffer.len(), 4);
        let positions: Vec<usize> = buffer.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_clear_half_odd_drops_floor_half() {
        let mut buffer = ReplayBuffer::with_seed(20, SIZE, 1);
        buffer.push_game(&tagged_game(0, 7, Winner::Draw)).unwrap();
        buffer.clear_half();
        // 7 / 2 = 3 oldest discarded, newest 4 kept.
        assert_eq!(buffer.len(), 4);
        let positions: Vec<usize> = buffer.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![3, 4, 5, 6]);

        let mut single = ReplayBuffer::with_seed(20, SIZE, 1);
        single.push_game(&tagged_game(0, 1, Winner::Draw)).unwrap();
        single.clear_half();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_off_board_column_is_rejected() {
        let mut buffer = ReplayBuffer::with_seed(10, 6, 1);
        buffer.push_game(&tagged_game_on(6, &[(0, 0)])).unwrap();

        // (0, 7) would otherwise alias (1, 1).
        let result = buffer.push_game(&tagged_game_on(6, &[(0, 1), (0, 7)]));
        assert_eq!(
            result,
            Err(BufferError::Shape {
                index: 1,
                board_size: 6,
                reason: "position (0, 7) is off the board".into(),
            })
        );
        // Nothing from the rejected game was stored.
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_wrong_board_length_is_rejected() {
        let mut buffer = ReplayBuffer::with_seed(10, 6, 1);
        let mut record = tagged_game_on(6, &[(0, 0), (1, 1)]);
        record.moves[0].board = vec![Player::None; 49];

        assert!(matches!(
            buffer.push_game(&record),
            Err(BufferError::Shape { index: 0, .. })
        ));
        assert!(buffer.is_empty());
    }

    fn tagged_game_on(size: usize, positions: &[(usize, usize)]) -> GameRecord {
        let samples = positions
            .iter()
            .map(|&position| MoveSample {
                player: Player::Black,
                board: vec![Player::None; size * size],
                position,
            })
            .collect();
        GameRecord::new(Winner::Black, samples)
    }
}
