//! # Connect6 Zero
//!
//! Self-play training pipeline for an AlphaZero-style Connect6 agent.
//!
//! ## Features
//!
//! - **Game**: Connect6 rules (one opening stone, then two per turn, six in a row wins)
//! - **Replay buffer**: bounded FIFO of per-move samples with uniform sampling
//! - **Self-play**: policy-guided search engine and a pool of worker threads
//! - **Training loop**: warm-up gating, mini-batch training, versioned checkpoints and resume
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use connect6_zero::{
//!     config::TrainingConfig,
//!     neural::WeightedPolicy,
//!     selfplay::PolicyGuidedEngine,
//!     training::{StopSignal, TrainingLoop},
//! };
//!
//! let config = TrainingConfig::default();
//! let engine = Arc::new(PolicyGuidedEngine::new());
//! let mut training = TrainingLoop::<WeightedPolicy, _>::new(config, engine, StopSignal::new())?;
//! training.run()?;
//! # Ok::<(), connect6_zero::Connect6ZeroError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Policy snapshots and the checkpoint store
pub mod checkpoint;

/// Training and self-play configuration
pub mod config;

/// Connect6 rules and game records
pub mod game;

/// Logger setup
pub mod logging;

/// Policy contract and models
pub mod neural;

/// Replay buffer
pub mod replay;

/// Search engine and worker pool
pub mod selfplay;

/// Training loop and loss summary
pub mod training;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use checkpoint::{CheckpointError, CheckpointStore, PolicySnapshot};
pub use config::{ConfigError, ModelConfig, SelfPlayParams, TrainingConfig};
pub use game::{Game, GameRecord, MoveSample, Player, Winner};
pub use neural::{Evaluator, PolicyCallback, PolicyError, PolicyService, RandomPolicy, WeightedPolicy};
pub use replay::{BufferError, ReplayBuffer, SampleBatch};
pub use selfplay::{EngineError, PolicyGuidedEngine, SearchEngine, WorkerError, WorkerPool};
pub use training::{StopSignal, TrainingError, TrainingLoop};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the library
#[derive(Debug, thiserror::Error)]
pub enum Connect6ZeroError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Game error: {0}")]
    Game(#[from] game::GameError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Connect6ZeroError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
