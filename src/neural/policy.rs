//! Policy contract shared by the search engine, the workers and the trainer.
//!
//! The engine only ever sees a [`PolicyCallback`], which checks every call
//! against the board capacity in both directions. A policy that returns the
//! wrong number of rows or columns is reported, never reshaped.

use crate::checkpoint::PolicySnapshot;
use crate::config::{ModelConfig, SelfPlayParams};
use crate::game::Player;
use crate::replay::SampleBatch;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid policy output: {0}")]
    InvalidOutput(String),

    #[error("model topology mismatch: expected {expected}, found {found}")]
    TopologyMismatch { expected: String, found: String },

    #[error("cannot train on an empty batch")]
    EmptyBatch,

    #[error("weights error: {0}")]
    Weights(String),

    #[error("torch error: {0}")]
    Tch(#[from] tch::TchError),
}

/// Output of one policy call over `K` boards.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// One value per board, from the side to move.
    pub values: Vec<f32>,
    /// `K × capacity` non-negative scores.
    pub policy: Vec<Vec<f32>>,
}

impl Evaluation {
    /// Reject anything that is not exactly `k` values and `k × capacity` scores.
    pub fn check(&self, k: usize, capacity: usize) -> Result<(), PolicyError> {
        if self.values.len() != k {
            return Err(PolicyError::ShapeMismatch {
                what: "value length",
                expected: k,
                actual: self.values.len(),
            });
        }
        if self.policy.len() != k {
            return Err(PolicyError::ShapeMismatch {
                what: "policy rows",
                expected: k,
                actual: self.policy.len(),
            });
        }
        for row in &self.policy {
            if row.len() != capacity {
                return Err(PolicyError::ShapeMismatch {
                    what: "policy row length",
                    expected: capacity,
                    actual: row.len(),
                });
            }
            if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(PolicyError::InvalidOutput(format!(
                    "policy score {} is negative or not finite",
                    bad
                )));
            }
        }
        if let Some(bad) = self.values.iter().find(|v| !v.is_finite()) {
            return Err(PolicyError::InvalidOutput(format!("value {} is not finite", bad)));
        }
        Ok(())
    }
}

/// Loss components reported by a training step or a loss probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainStats {
    pub value_mse: f64,
    pub policy_ce: f64,
    pub loss: f64,
}

/// Anything that can score boards for the side to move.
pub trait Evaluator {
    fn evaluate(&self, turn: Player, boards: &[Vec<Player>]) -> Result<Evaluation, PolicyError>;

    fn board_size(&self) -> usize;
}

/// A trainable model that can be frozen into, and rebuilt from, a snapshot.
pub trait PolicyService: Evaluator + Sized {
    /// Tag stored in checkpoint metadata and checked on load.
    const ARCHITECTURE: &'static str;

    fn new(config: &ModelConfig) -> Result<Self, PolicyError>;

    fn model_config(&self) -> &ModelConfig;

    /// One optimizer step on `batch`.
    fn train(&mut self, batch: &SampleBatch) -> Result<TrainStats, PolicyError>;

    /// Loss on `batch` without touching the parameters.
    fn loss(&self, batch: &SampleBatch) -> Result<TrainStats, PolicyError>;

    fn export_weights(&self) -> Result<Vec<u8>, PolicyError>;

    /// Build the topology described by `config`, then restore `weights` into it.
    fn from_parts(config: &ModelConfig, weights: &[u8]) -> Result<Self, PolicyError>;

    fn snapshot(&self, version: u64, self_play: &SelfPlayParams) -> Result<PolicySnapshot, PolicyError> {
        Ok(PolicySnapshot {
            version,
            model: self.model_config().clone(),
            weights: self.export_weights()?,
            self_play: self_play.clone(),
        })
    }

    fn from_snapshot(snapshot: &PolicySnapshot) -> Result<Self, PolicyError> {
        Self::from_parts(&snapshot.model, &snapshot.weights)
    }
}

/// Fail unless `config` describes the architecture `expected`.
pub fn ensure_architecture(config: &ModelConfig, expected: &str) -> Result<(), PolicyError> {
    if config.architecture != expected {
        return Err(PolicyError::TopologyMismatch {
            expected: expected.to_string(),
            found: config.architecture.clone(),
        });
    }
    Ok(())
}

/// The synchronous callback handed to the search engine.
pub struct PolicyCallback<'a> {
    inner: &'a dyn Evaluator,
    capacity: usize,
}

impl<'a> PolicyCallback<'a> {
    pub fn new(inner: &'a dyn Evaluator) -> Self {
        let size = inner.board_size();
        Self {
            inner,
            capacity: size * size,
        }
    }

    pub fn board_size(&self) -> usize {
        self.inner.board_size()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn call(&self, turn: Player, boards: &[Vec<Player>]) -> Result<Evaluation, PolicyError> {
        for board in boards {
            if board.len() != self.capacity {
                return Err(PolicyError::ShapeMismatch {
                    what: "board length",
                    expected: self.capacity,
                    actual: board.len(),
                });
            }
        }
        let evaluation = self.inner.evaluate(turn, boards)?;
        evaluation.check(boards.len(), self.capacity)?;
        Ok(evaluation)
    }
}
