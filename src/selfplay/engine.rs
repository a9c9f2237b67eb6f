//! Self-play search engine.
//!
//! [`PolicyGuidedEngine`] runs a one-ply PUCT search for every stone: the
//! root priors come from the policy (mixed with Dirichlet noise), each
//! candidate placement is expanded once and valued by the policy from the
//! point of view of the side that moved, and the most visited placement is
//! played.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::SelfPlayParams;
use crate::game::{Game, GameError, GameRecord, MoveSample, Player, Winner};
use crate::neural::policy::{PolicyCallback, PolicyError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("game error: {0}")]
    Game(#[from] GameError),

    #[error("root noise: {0}")]
    Noise(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input closed before the game finished")]
    InputClosed,
}

/// Plays complete games through a checked policy callback.
pub trait SearchEngine: Send + Sync {
    /// Play `params.num_game_thread` games and return their records.
    fn self_play(
        &self,
        policy: &PolicyCallback<'_>,
        params: &SelfPlayParams,
    ) -> Result<Vec<GameRecord>, EngineError>;
}

pub struct PolicyGuidedEngine {
    seed: Option<u64>,
    games: AtomicU64,
}

impl PolicyGuidedEngine {
    pub fn new() -> Self {
        Self {
            seed: None,
            games: AtomicU64::new(0),
        }
    }

    /// Deterministic engine: game `i` is played with a generator seeded by `seed + i`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            games: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_rng(&self) -> StdRng {
        let game = self.games.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(game)),
            None => StdRng::seed_from_u64(rand::random()),
        }
    }

    /// Play a single game and return the winner and the move path.
    pub fn with_param(
        &self,
        policy: &PolicyCallback<'_>,
        params: &SelfPlayParams,
    ) -> Result<(Winner, Vec<MoveSample>), EngineError> {
        let mut rng = self.next_rng();
        let mut game = Game::new(policy.board_size());
        let mut moves = Vec::new();

        while !game.is_over() {
            let index = search(&game, policy, params, &mut rng)?;
            let (row, col) = game.board().position(index);
            moves.push(MoveSample {
                player: game.turn(),
                board: game.board().cells().to_vec(),
                position: (row, col),
            });
            let placement = game.play(row, col)?;
            if params.debug {
                log::debug!(
                    "move {}: {} -> ({}, {}), {} left this turn",
                    moves.len(),
                    placement.player,
                    row,
                    col,
                    placement.remaining
                );
            }
        }

        let winner = game.winner().unwrap_or(Winner::Draw);
        if params.debug {
            log::info!("🏁 game over: winner {}, {} moves", winner, moves.len());
        }
        Ok((winner, moves))
    }
}

impl Default for PolicyGuidedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine for PolicyGuidedEngine {
    fn self_play(
        &self,
        policy: &PolicyCallback<'_>,
        params: &SelfPlayParams,
    ) -> Result<Vec<GameRecord>, EngineError> {
        (0..params.num_game_thread)
            .map(|_| {
                self.with_param(policy, params)
                    .map(|(winner, moves)| GameRecord::new(winner, moves))
            })
            .collect()
    }
}

struct Child {
    index: usize,
    prior: f32,
    visits: u32,
    total: f32,
    /// Value of the placement for the side that made it, once expanded.
    value: Option<f32>,
}

impl Child {
    fn score(&self, c_puct: f32, sqrt_parent: f32) -> f32 {
        let q = if self.visits == 0 {
            0.0
        } else {
            self.total / self.visits as f32
        };
        q + c_puct * self.prior * sqrt_parent / (1.0 + self.visits as f32)
    }
}

/// Pick the flattened cell to play next.
pub(crate) fn search(
    game: &Game,
    policy: &PolicyCallback<'_>,
    params: &SelfPlayParams,
    rng: &mut StdRng,
) -> Result<usize, EngineError> {
    let mover = game.turn();
    let cells = game.board().cells();
    let root = policy.call(mover, &[cells.to_vec()])?;

    let legal: Vec<usize> = game.board().empty_cells().collect();
    if legal.is_empty() {
        return Err(EngineError::Game(GameError::Finished));
    }

    let priors = root_priors(&root.policy[0], &legal, params, rng)?;
    let mut children: Vec<Child> = legal
        .iter()
        .zip(priors)
        .map(|(&index, prior)| Child {
            index,
            prior,
            visits: 0,
            total: 0.0,
            value: None,
        })
        .collect();

    let mut simulations = 0;
    let mut pending: Vec<usize> = Vec::with_capacity(params.num_expansion);
    while simulations < params.num_simulation {
        let parent_visits: u32 = children.iter().map(|c| c.visits).sum();
        let sqrt_parent = (parent_visits.max(1) as f32).sqrt();

        let selected = children
            .iter()
            .enumerate()
            .filter(|(i, _)| !pending.contains(i))
            .max_by(|(_, a), (_, b)| {
                a.score(params.c_puct, sqrt_parent)
                    .total_cmp(&b.score(params.c_puct, sqrt_parent))
            })
            .map(|(i, _)| i);

        match selected {
            Some(i) if children[i].value.is_some() => {
                let child = &mut children[i];
                child.visits += 1;
                child.total += child.value.unwrap_or_default();
                simulations += 1;
            }
            Some(i) => {
                pending.push(i);
                let room = params.num_simulation - simulations;
                if pending.len() >= params.num_expansion.min(room) {
                    simulations += expand(game, policy, &mut children, &mut pending)?;
                }
            }
            None => {
                simulations += expand(game, policy, &mut children, &mut pending)?;
            }
        }
    }
    if !pending.is_empty() {
        expand(game, policy, &mut children, &mut pending)?;
    }

    children
        .iter()
        .max_by(|a, b| a.visits.cmp(&b.visits).then(a.prior.total_cmp(&b.prior)))
        .map(|child| child.index)
        .ok_or(EngineError::Game(GameError::Finished))
}

/// Value every pending child in one policy call and record one visit each.
fn expand(
    game: &Game,
    policy: &PolicyCallback<'_>,
    children: &mut [Child],
    pending: &mut Vec<usize>,
) -> Result<usize, EngineError> {
    let mover = game.turn();
    let mut values = vec![0.0f32; pending.len()];
    let mut boards = Vec::new();
    let mut open = Vec::new();
    let mut next_turn = Player::None;

    for (slot, &i) in pending.iter().enumerate() {
        let mut child_game = game.clone();
        let (row, col) = game.board().position(children[i].index);
        child_game.play(row, col)?;
        match child_game.winner() {
            Some(winner) => values[slot] = winner.value_for(mover),
            None => {
                next_turn = child_game.turn();
                boards.push(child_game.board().cells().to_vec());
                open.push(slot);
            }
        }
    }

    if !boards.is_empty() {
        let evaluation = policy.call(next_turn, &boards)?;
        for (&slot, &value) in open.iter().zip(&evaluation.values) {
            values[slot] = if next_turn == mover { value } else { -value };
        }
    }

    for (&i, &value) in pending.iter().zip(&values) {
        let child = &mut children[i];
        child.value = Some(value);
        child.visits += 1;
        child.total += value;
    }
    let expanded = pending.len();
    pending.clear();
    Ok(expanded)
}

/// Policy scores restricted to `legal`, normalised, then mixed with Dirichlet noise.
fn root_priors(
    scores: &[f32],
    legal: &[usize],
    params: &SelfPlayParams,
    rng: &mut StdRng,
) -> Result<Vec<f32>, EngineError> {
    let mut priors: Vec<f32> = legal.iter().map(|&i| scores[i]).collect();
    normalise(&mut priors);

    if params.epsilon > 0.0 {
        let gamma = Gamma::new(params.dirichlet_alpha, 1.0)
            .map_err(|e| EngineError::Noise(e.to_string()))?;
        let mut noise: Vec<f32> = legal.iter().map(|_| gamma.sample(rng) as f32).collect();
        normalise(&mut noise);
        for (prior, eta) in priors.iter_mut().zip(noise) {
            *prior = (1.0 - params.epsilon) * *prior + params.epsilon * eta;
        }
    }
    Ok(priors)
}

fn normalise(values: &mut [f32]) {
    let sum: f32 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        values.iter_mut().for_each(|v| *v /= sum);
    } else {
        let uniform = 1.0 / values.len() as f32;
        values.iter_mut().for_each(|v| *v = uniform);
    }
}
