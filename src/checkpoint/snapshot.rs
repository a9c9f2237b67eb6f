use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, SelfPlayParams};

/// A frozen copy of the policy, tagged with the epoch it was taken at.
///
/// The self-play hyperparameters travel with the weights so that a restored
/// run and every worker replica play with the settings the model was
/// trained under.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySnapshot {
    pub version: u64,
    pub model: ModelConfig,
    /// Opaque weight blob, only meaningful to the policy that produced it.
    pub weights: Vec<u8>,
    pub self_play: SelfPlayParams,
}

/// Contents of `model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: u64,
    pub created_at: String,
    pub model: ModelConfig,
}
