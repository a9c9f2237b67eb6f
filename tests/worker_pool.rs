//! Worker pool rounds and shutdown, driven by a scripted engine.

use std::sync::Arc;

use connect6_zero::checkpoint::PolicySnapshot;
use connect6_zero::config::{ModelConfig, SelfPlayParams};
use connect6_zero::game::{GameRecord, MoveSample, Player, Winner};
use connect6_zero::neural::{PolicyCallback, RandomPolicy};
use connect6_zero::replay::ReplayBuffer;
use connect6_zero::selfplay::{EngineError, RoundSummary, SearchEngine, WorkerPool};

const SIZE: usize = 6;

/// Plays `num_game_thread` games of `moves` stones each without searching.
struct Scripted {
    moves: usize,
}

impl SearchEngine for Scripted {
    fn self_play(
        &self,
        policy: &PolicyCallback<'_>,
        params: &SelfPlayParams,
    ) -> Result<Vec<GameRecord>, EngineError> {
        // One real call so the replica and the callback checks are exercised.
        policy.call(Player::Black, &[vec![Player::None; policy.capacity()]])?;
        let game = GameRecord::new(
            Winner::White,
            (0..self.moves)
                .map(|i| MoveSample {
                    player: if i % 2 == 0 { Player::Black } else { Player::White },
                    board: vec![Player::None; policy.capacity()],
                    position: (i / SIZE, i % SIZE),
                })
                .collect(),
        );
        Ok(vec![game; params.num_game_thread])
    }
}

fn snapshot(version: u64, num_game_thread: usize) -> Arc<PolicySnapshot> {
    Arc::new(PolicySnapshot {
        version,
        model: ModelConfig {
            architecture: "random".into(),
            board_size: SIZE,
            learning_rate: 1e-3,
            momentum: 0.9,
        },
        weights: Vec::new(),
        self_play: SelfPlayParams {
            num_game_thread,
            ..Default::default()
        },
    })
}

#[test]
fn test_play_collects_exactly_num_results() {
    let mut pool = WorkerPool::start::<RandomPolicy, _>(2, Arc::new(Scripted { moves: 3 })).unwrap();
    let mut buffer = ReplayBuffer::with_seed(1_000, SIZE, 1);

    let summary = pool.play(5, &mut buffer, snapshot(0, 1)).unwrap();
    assert_eq!(summary, RoundSummary { games: 5, moves: 15 });
    assert_eq!(buffer.len(), 15);

    pool.terminate().unwrap();
}

#[test]
fn test_snapshot_params_reach_the_engine() {
    let mut pool = WorkerPool::start::<RandomPolicy, _>(3, Arc::new(Scripted { moves: 2 })).unwrap();
    let mut buffer = ReplayBuffer::with_seed(1_000, SIZE, 1);

    let first = pool.play(4, &mut buffer, snapshot(0, 2)).unwrap();
    assert_eq!(first.games, 8);
    // A new version makes every worker rebuild its replica.
    let second = pool.play(3, &mut buffer, snapshot(1, 1)).unwrap();
    assert_eq!(second.games, 3);
    assert_eq!(buffer.len(), (8 + 3) * 2);

    pool.terminate().unwrap();
}

#[test]
fn test_buffer_stays_bounded_across_rounds() {
    let mut pool = WorkerPool::start::<RandomPolicy, _>(2, Arc::new(Scripted { moves: 7 })).unwrap();
    let mut buffer = ReplayBuffer::with_seed(20, SIZE, 1);
    for version in 0..4 {
        pool.play(3, &mut buffer, snapshot(version, 1)).unwrap();
        assert!(buffer.len() <= 20);
    }
    assert_eq!(buffer.len(), 20);
    pool.terminate().unwrap();
}

#[test]
fn test_terminate_collects_every_ack() {
    let mut pool = WorkerPool::start::<RandomPolicy, _>(4, Arc::new(Scripted { moves: 1 })).unwrap();
    assert_eq!(pool.num_workers(), 4);
    pool.terminate().unwrap();
    assert!(!pool.is_running());
    // Second call is a no-op.
    pool.terminate().unwrap();
}

#[test]
fn test_drop_without_terminate_does_not_hang() {
    let pool = WorkerPool::start::<RandomPolicy, _>(2, Arc::new(Scripted { moves: 1 })).unwrap();
    drop(pool);
}
