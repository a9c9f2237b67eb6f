use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::snapshot::{PolicySnapshot, SnapshotMetadata};
use crate::config::{ModelConfig, SelfPlayParams};

const MODEL_FILE: &str = "model.json";
const WEIGHTS_FILE: &str = "weights.safetensors";
const SELF_PLAY_FILE: &str = "self_play.json";

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint for epoch {epoch} in {dir}")]
    NotFound { epoch: u64, dir: PathBuf },

    #[error("failed to read {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("checkpoint topology mismatch: {0}")]
    TopologyMismatch(String),

    #[error("invalid checkpoint pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Epoch-indexed snapshots of one training run.
///
/// Every epoch lives in its own `epoch_NNNNNN` directory, written under a
/// `.tmp` name first and renamed once all three files are on disk.
pub struct CheckpointStore {
    run_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn epoch_dir(&self, epoch: u64) -> PathBuf {
        self.run_dir.join(format!("epoch_{:06}", epoch))
    }

    pub fn save(&self, snapshot: &PolicySnapshot) -> Result<PathBuf, CheckpointError> {
        let final_dir = self.epoch_dir(snapshot.version);
        let tmp_dir = final_dir.with_extension("tmp");

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        let metadata = SnapshotMetadata {
            version: snapshot.version,
            created_at: chrono::Local::now().to_rfc3339(),
            model: snapshot.model.clone(),
        };
        fs::write(tmp_dir.join(MODEL_FILE), serde_json::to_string_pretty(&metadata)?)?;
        fs::write(tmp_dir.join(WEIGHTS_FILE), &snapshot.weights)?;
        fs::write(
            tmp_dir.join(SELF_PLAY_FILE),
            serde_json::to_string_pretty(&snapshot.self_play)?,
        )?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        log::info!("💾 Checkpoint saved: {}", final_dir.display());
        Ok(final_dir)
    }

    pub fn load(&self, epoch: u64) -> Result<PolicySnapshot, CheckpointError> {
        let dir = self.epoch_dir(epoch);
        if !dir.is_dir() {
            return Err(CheckpointError::NotFound {
                epoch,
                dir: self.run_dir.clone(),
            });
        }

        let metadata: SnapshotMetadata = read_json(&dir.join(MODEL_FILE))?;
        if metadata.version != epoch {
            return Err(CheckpointError::TopologyMismatch(format!(
                "{} records version {}, expected {}",
                dir.display(),
                metadata.version,
                epoch
            )));
        }
        let self_play: SelfPlayParams = read_json(&dir.join(SELF_PLAY_FILE))?;

        let weights_path = dir.join(WEIGHTS_FILE);
        let weights = fs::read(&weights_path).map_err(|e| CheckpointError::MetadataRead {
            path: weights_path,
            source: e,
        })?;

        Ok(PolicySnapshot {
            version: metadata.version,
            model: metadata.model,
            weights,
            self_play,
        })
    }

    /// Load `epoch` and fail unless it was saved for the model described by `expected`.
    pub fn load_checked(
        &self,
        epoch: u64,
        expected: &ModelConfig,
    ) -> Result<PolicySnapshot, CheckpointError> {
        let snapshot = self.load(epoch)?;
        if snapshot.model.architecture != expected.architecture {
            return Err(CheckpointError::TopologyMismatch(format!(
                "architecture {} in checkpoint, {} configured",
                snapshot.model.architecture, expected.architecture
            )));
        }
        if snapshot.model.board_size != expected.board_size {
            return Err(CheckpointError::TopologyMismatch(format!(
                "board size {} in checkpoint, {} configured",
                snapshot.model.board_size, expected.board_size
            )));
        }
        Ok(snapshot)
    }

    /// Saved epochs in ascending order. Unfinished `.tmp` directories are skipped.
    pub fn list_epochs(&self) -> Result<Vec<u64>, CheckpointError> {
        let pattern = self.run_dir.join("epoch_*");
        let mut epochs = Vec::new();
        for path in glob::glob(&pattern.to_string_lossy())?.flatten() {
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(epoch) = name.strip_prefix("epoch_").and_then(|n| n.parse::<u64>().ok()) {
                epochs.push(epoch);
            }
        }
        epochs.sort_unstable();
        Ok(epochs)
    }

    pub fn latest_epoch(&self) -> Result<Option<u64>, CheckpointError> {
        Ok(self.list_epochs()?.last().copied())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CheckpointError> {
    let text = fs::read_to_string(path).map_err(|e| CheckpointError::MetadataRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| CheckpointError::MetadataParse {
        path: path.to_path_buf(),
        source: e,
    })
}
