//! Single-layer policy/value model.
//!
//! The input is the side to move followed by the flattened board
//! (`1 + size²` features). A linear policy head produces one logit per cell
//! and a linear value head squashed by tanh produces the value.

use tch::nn::{self, Module, OptimizerConfig};
use tch::{Device, Kind, Tensor};

use crate::config::ModelConfig;
use crate::game::Player;
use crate::neural::model_io::{load_varstore_from_bytes, varstore_to_bytes};
use crate::neural::policy::{ensure_architecture, Evaluation, Evaluator, PolicyError, PolicyService, TrainStats};
use crate::replay::SampleBatch;

pub struct WeightedPolicy {
    config: ModelConfig,
    vs: nn::VarStore,
    policy_head: nn::Linear,
    value_head: nn::Linear,
    optimizer: nn::Optimizer,
}

impl WeightedPolicy {
    fn build(config: &ModelConfig) -> Result<Self, PolicyError> {
        ensure_architecture(config, Self::ARCHITECTURE)?;

        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();
        let capacity = config.board_capacity() as i64;

        let policy_head = nn::linear(&root / "policy", capacity + 1, capacity, Default::default());
        let value_head = nn::linear(&root / "value", capacity + 1, 1, Default::default());

        let optimizer = nn::Sgd {
            momentum: config.momentum,
            ..Default::default()
        }
        .build(&vs, config.learning_rate)?;

        log::debug!(
            "WeightedPolicy built: board_size={}, lr={}, momentum={}",
            config.board_size,
            config.learning_rate,
            config.momentum
        );

        Ok(Self {
            config: config.clone(),
            vs,
            policy_head,
            value_head,
            optimizer,
        })
    }

    fn encode(&self, turns: &[Player], boards: &[Vec<Player>]) -> Tensor {
        let width = self.config.board_capacity() + 1;
        let mut flat = Vec::with_capacity(boards.len() * width);
        for (turn, board) in turns.iter().zip(boards) {
            flat.push(turn.as_f32());
            flat.extend(board.iter().map(|cell| cell.as_f32()));
        }
        Tensor::from_slice(&flat).view([boards.len() as i64, width as i64])
    }

    /// Returns `(value [K], logits [K, capacity])`.
    fn forward(&self, input: &Tensor) -> (Tensor, Tensor) {
        let logits = self.policy_head.forward(input);
        let value = self.value_head.forward(input).tanh().view([-1]);
        (value, logits)
    }

    fn losses(&self, batch: &SampleBatch) -> Result<(Tensor, Tensor), PolicyError> {
        if batch.is_empty() {
            return Err(PolicyError::EmptyBatch);
        }
        let input = self.encode(&batch.players, &batch.boards);
        let (value, logits) = self.forward(&input);

        let target_value = Tensor::from_slice(&batch.values);
        let positions: Vec<i64> = batch.positions.iter().map(|&p| p as i64).collect();
        let target_policy = Tensor::from_slice(&positions);

        let value_loss = (value - target_value).square().mean(Kind::Float);
        let policy_loss = logits.cross_entropy_for_logits(&target_policy);
        Ok((value_loss, policy_loss))
    }
}

fn stats(value_loss: &Tensor, policy_loss: &Tensor) -> Result<TrainStats, PolicyError> {
    let value_mse = value_loss.f_double_value(&[])?;
    let policy_ce = policy_loss.f_double_value(&[])?;
    Ok(TrainStats {
        value_mse,
        policy_ce,
        loss: value_mse + policy_ce,
    })
}

impl Evaluator for WeightedPolicy {
    fn evaluate(&self, turn: Player, boards: &[Vec<Player>]) -> Result<Evaluation, PolicyError> {
        if boards.is_empty() {
            return Ok(Evaluation {
                values: Vec::new(),
                policy: Vec::new(),
            });
        }
        let turns = vec![turn; boards.len()];
        let input = self.encode(&turns, boards);
        let (value, logits) = tch::no_grad(|| self.forward(&input));

        let values = Vec::<f32>::try_from(&value)?;
        let probs = Vec::<f32>::try_from(&logits.softmax(-1, Kind::Float).flatten(0, -1))?;
        let policy = probs
            .chunks(self.config.board_capacity())
            .map(|row| row.to_vec())
            .collect();

        Ok(Evaluation { values, policy })
    }

    fn board_size(&self) -> usize {
        self.config.board_size
    }
}

impl PolicyService for WeightedPolicy {
    const ARCHITECTURE: &'static str = "weighted-linear";

    fn new(config: &ModelConfig) -> Result<Self, PolicyError> {
        Self::build(config)
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn train(&mut self, batch: &SampleBatch) -> Result<TrainStats, PolicyError> {
        let (value_loss, policy_loss) = self.losses(batch)?;
        let loss = &value_loss + &policy_loss;
        self.optimizer.backward_step(&loss);
        stats(&value_loss, &policy_loss)
    }

    fn loss(&self, batch: &SampleBatch) -> Result<TrainStats, PolicyError> {
        let (value_loss, policy_loss) = tch::no_grad(|| self.losses(batch))?;
        stats(&value_loss, &policy_loss)
    }

    fn export_weights(&self) -> Result<Vec<u8>, PolicyError> {
        varstore_to_bytes(&self.vs)
    }

    fn from_parts(config: &ModelConfig, weights: &[u8]) -> Result<Self, PolicyError> {
        let mut policy = Self::build(config)?;
        load_varstore_from_bytes(&mut policy.vs, weights)?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelfPlayParams;

    fn config(board_size: usize) -> ModelConfig {
        ModelConfig {
            architecture: WeightedPolicy::ARCHITECTURE.to_string(),
            board_size,
            learning_rate: 0.01,
            momentum: 0.9,
        }
    }

    fn boards(size: usize, k: usize) -> Vec<Vec<Player>> {
        (0..k)
            .map(|i| {
                (0..size * size)
                    .map(|j| Player::from_i8(((i + j) % 3) as i8 - 1).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_evaluate_shapes() {
        let policy = WeightedPolicy::new(&config(6)).unwrap();
        let eval = policy.evaluate(Player::Black, &boards(6, 3)).unwrap();
        eval.check(3, 36).unwrap();
        for row in &eval.policy {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
        for v in &eval.values {
            assert!((-1.0..=1.0).contains(v));
        }
    }

    #[test]
    fn test_wrong_architecture_rejected() {
        let mut bad = config(6);
        bad.architecture = "resnet".to_string();
        assert!(matches!(
            WeightedPolicy::new(&bad),
            Err(PolicyError::TopologyMismatch { .. })
        ));
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut policy = WeightedPolicy::new(&config(6)).unwrap();
        let batch = SampleBatch {
            players: vec![Player::Black, Player::White, Player::Black, Player::White],
            values: vec![1.0, -1.0, 1.0, -1.0],
            boards: boards(6, 4),
            positions: vec![3, 7, 3, 7],
        };
        let before = policy.loss(&batch).unwrap();
        for _ in 0..50 {
            policy.train(&batch).unwrap();
        }
        let after = policy.loss(&batch).unwrap();
        assert!(after.loss < before.loss, "{:?} -> {:?}", before, after);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut policy = WeightedPolicy::new(&config(6)).unwrap();
        assert!(matches!(
            policy.train(&SampleBatch::default()),
            Err(PolicyError::EmptyBatch)
        ));
    }

    #[test]
    fn test_snapshot_roundtrip_is_bit_identical() {
        let mut policy = WeightedPolicy::new(&config(6)).unwrap();
        let batch = SampleBatch {
            players: vec![Player::Black; 2],
            values: vec![1.0, -1.0],
            boards: boards(6, 2),
            positions: vec![0, 35],
        };
        policy.train(&batch).unwrap();

        let snapshot = policy.snapshot(7, &SelfPlayParams::default()).unwrap();
        assert_eq!(snapshot.version, 7);
        let restored = WeightedPolicy::from_snapshot(&snapshot).unwrap();

        let input = boards(6, 5);
        let a = policy.evaluate(Player::White, &input).unwrap();
        let b = restored.evaluate(Player::White, &input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_weights_for_other_board_size_rejected() {
        let small = WeightedPolicy::new(&config(6)).unwrap();
        let weights = small.export_weights().unwrap();
        assert!(WeightedPolicy::from_parts(&config(7), &weights).is_err());
    }
}
