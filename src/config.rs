//! Training configuration.
//!
//! A `TrainingConfig` is built once (from the command line or in code),
//! validated, and then passed by reference to everything that needs it.
//! Nothing reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::game::DEFAULT_BOARD_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Hyperparameters handed verbatim to the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayParams {
    /// Number of simulations per move
    pub num_simulation: usize,
    /// Number of boards expanded per policy call
    pub num_expansion: usize,
    /// Ratio of Dirichlet noise mixed into the root priors
    pub epsilon: f32,
    /// Concentration of the Dirichlet noise
    pub dirichlet_alpha: f64,
    /// Exploration constant of the PUCT rule
    pub c_puct: f32,
    /// Log every move when set
    pub debug: bool,
    /// Games played per engine call
    pub num_game_thread: usize,
}

impl Default for SelfPlayParams {
    fn default() -> Self {
        Self {
            num_simulation: 800,
            num_expansion: 1,
            epsilon: 0.25,
            dirichlet_alpha: 0.03,
            c_puct: 1.0,
            debug: false,
            num_game_thread: 1,
        }
    }
}

impl SelfPlayParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_simulation == 0 {
            return Err(ConfigError::Validation("num_simulation must be > 0".into()));
        }
        if self.num_expansion == 0 {
            return Err(ConfigError::Validation("num_expansion must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ConfigError::Validation("epsilon must be within [0, 1]".into()));
        }
        if self.dirichlet_alpha <= 0.0 {
            return Err(ConfigError::Validation("dirichlet_alpha must be > 0".into()));
        }
        if self.c_puct < 0.0 {
            return Err(ConfigError::Validation("c_puct must be >= 0".into()));
        }
        if self.num_game_thread == 0 {
            return Err(ConfigError::Validation("num_game_thread must be > 0".into()));
        }
        Ok(())
    }
}

/// Hyperparameters that define a model's topology and optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub architecture: String,
    pub board_size: usize,
    pub learning_rate: f64,
    pub momentum: f64,
}

impl ModelConfig {
    pub fn board_capacity(&self) -> usize {
        self.board_size * self.board_size
    }
}

/// Everything the training loop needs, fixed for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub name: String,
    pub board_size: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Replay buffer capacity
    pub max_buffer: usize,
    /// Buffer length below which training is deferred
    pub start_train: usize,
    /// Gradient steps per epoch
    pub batch_size: usize,
    /// Samples per gradient step
    pub mini_batch: usize,
    /// Epochs between checkpoints
    pub ckpt_interval: usize,
    pub clear_half_on_checkpoint: bool,
    pub num_workers: usize,
    /// Self-play requests per generation round
    pub games_per_round: usize,
    pub ckpt_dir: PathBuf,
    pub summary_dir: PathBuf,
    pub load_epoch: Option<usize>,
    pub max_epochs: Option<usize>,
    pub seed: Option<u64>,
    pub self_play: SelfPlayParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            board_size: DEFAULT_BOARD_SIZE,
            learning_rate: 1e-3,
            momentum: 0.9,
            max_buffer: 10_000,
            start_train: 2_000,
            batch_size: 1,
            mini_batch: 1_024,
            ckpt_interval: 100,
            clear_half_on_checkpoint: false,
            num_workers: 1,
            games_per_round: 1,
            ckpt_dir: PathBuf::from("weighted/ckpt"),
            summary_dir: PathBuf::from("weighted/summary"),
            load_epoch: None,
            max_epochs: None,
            seed: None,
            self_play: SelfPlayParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Rows and columns are typed as single letters in interactive play.
        if !(crate::game::CONNECT..=26).contains(&self.board_size) {
            return Err(ConfigError::Validation(format!(
                "board_size must be within [{}, 26], got {}",
                crate::game::CONNECT,
                self.board_size
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(ConfigError::Validation("learning_rate must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(ConfigError::Validation("momentum must be within [0, 1)".into()));
        }
        if self.max_buffer == 0 {
            return Err(ConfigError::Validation("max_buffer must be > 0".into()));
        }
        if self.mini_batch == 0 || self.mini_batch > self.max_buffer {
            return Err(ConfigError::Validation(format!(
                "mini_batch must be within [1, max_buffer={}], got {}",
                self.max_buffer, self.mini_batch
            )));
        }
        if self.start_train < self.mini_batch {
            return Err(ConfigError::Validation(format!(
                "start_train ({}) must be >= mini_batch ({})",
                self.start_train, self.mini_batch
            )));
        }
        if self.start_train > self.max_buffer {
            return Err(ConfigError::Validation(format!(
                "start_train ({}) must be <= max_buffer ({})",
                self.start_train, self.max_buffer
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be > 0".into()));
        }
        if self.ckpt_interval == 0 {
            return Err(ConfigError::Validation("ckpt_interval must be > 0".into()));
        }
        if self.num_workers == 0 {
            return Err(ConfigError::Validation("num_workers must be > 0".into()));
        }
        if self.games_per_round == 0 {
            return Err(ConfigError::Validation("games_per_round must be > 0".into()));
        }
        self.self_play.validate()
    }

    pub fn model_config(&self, architecture: &str) -> ModelConfig {
        ModelConfig {
            architecture: architecture.to_string(),
            board_size: self.board_size,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
        }
    }

    /// Directory holding this run's checkpoints.
    pub fn run_dir(&self) -> PathBuf {
        self.ckpt_dir.join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            max_buffer: 100,
            start_train: 20,
            mini_batch: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_self_play_params() {
        let params = SelfPlayParams::default();
        assert_eq!(params.num_simulation, 800);
        assert_eq!(params.num_expansion, 1);
        assert_eq!(params.epsilon, 0.25);
        assert_eq!(params.dirichlet_alpha, 0.03);
        assert_eq!(params.c_puct, 1.0);
        assert!(!params.debug);
        assert_eq!(params.num_game_thread, 1);
    }

    #[test]
    fn test_default_config_is_valid() {
        TrainingConfig::default().validate().unwrap();
        small_config().validate().unwrap();
    }

    #[test]
    fn test_rejects_mini_batch_over_capacity() {
        let config = TrainingConfig {
            mini_batch: 200,
            start_train: 200,
            ..small_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_start_train_below_mini_batch() {
        let config = TrainingConfig {
            start_train: 5,
            ..small_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("start_train"));
    }

    #[test]
    fn test_rejects_zero_intervals_and_workers() {
        for config in [
            TrainingConfig { ckpt_interval: 0, ..small_config() },
            TrainingConfig { num_workers: 0, ..small_config() },
            TrainingConfig { batch_size: 0, ..small_config() },
            TrainingConfig { games_per_round: 0, ..small_config() },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_rejects_bad_self_play_params() {
        let mut config = small_config();
        config.self_play.epsilon = 1.5;
        assert!(config.validate().is_err());

        let mut config = small_config();
        config.self_play.num_game_thread = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_self_play_params_partial_json() {
        let params: SelfPlayParams = serde_json::from_str(r#"{"num_simulation": 10}"#).unwrap();
        assert_eq!(params.num_simulation, 10);
        assert_eq!(params.epsilon, 0.25);
    }

    #[test]
    fn test_model_config() {
        let config = small_config();
        let model = config.model_config("weighted-linear");
        assert_eq!(model.board_capacity(), 225);
        assert_eq!(model.architecture, "weighted-linear");
        assert_eq!(config.run_dir(), PathBuf::from("weighted/ckpt/default"));
    }
}
