//! Uniform random baseline policy.
//!
//! Values are drawn from `[0, 1)` and every cell gets an independent score
//! from `[0, 1)`. It has nothing to train and no weights, which makes it a
//! cheap stand-in wherever a real model is not needed.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::cell::RefCell;

use crate::config::ModelConfig;
use crate::game::Player;
use crate::neural::policy::{ensure_architecture, Evaluation, Evaluator, PolicyError, PolicyService, TrainStats};
use crate::replay::SampleBatch;

pub struct RandomPolicy {
    config: ModelConfig,
    rng: RefCell<StdRng>,
}

impl RandomPolicy {
    pub fn with_seed(config: &ModelConfig, seed: u64) -> Result<Self, PolicyError> {
        ensure_architecture(config, Self::ARCHITECTURE)?;
        Ok(Self {
            config: config.clone(),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        })
    }
}

impl Evaluator for RandomPolicy {
    fn evaluate(&self, _turn: Player, boards: &[Vec<Player>]) -> Result<Evaluation, PolicyError> {
        let capacity = self.config.board_capacity();
        let mut rng = self.rng.borrow_mut();
        let values = boards.iter().map(|_| rng.random::<f32>()).collect();
        let policy = boards
            .iter()
            .map(|_| (0..capacity).map(|_| rng.random::<f32>()).collect())
            .collect();
        Ok(Evaluation { values, policy })
    }

    fn board_size(&self) -> usize {
        self.config.board_size
    }
}

impl PolicyService for RandomPolicy {
    const ARCHITECTURE: &'static str = "random";

    fn new(config: &ModelConfig) -> Result<Self, PolicyError> {
        Self::with_seed(config, rand::random())
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn train(&mut self, batch: &SampleBatch) -> Result<TrainStats, PolicyError> {
        self.loss(batch)
    }

    fn loss(&self, batch: &SampleBatch) -> Result<TrainStats, PolicyError> {
        if batch.is_empty() {
            return Err(PolicyError::EmptyBatch);
        }
        Ok(TrainStats::default())
    }

    fn export_weights(&self) -> Result<Vec<u8>, PolicyError> {
        Ok(Vec::new())
    }

    fn from_parts(config: &ModelConfig, weights: &[u8]) -> Result<Self, PolicyError> {
        if !weights.is_empty() {
            return Err(PolicyError::Weights(format!(
                "random policy has no weights, got {} bytes",
                weights.len()
            )));
        }
        Self::new(config)
    }
}
