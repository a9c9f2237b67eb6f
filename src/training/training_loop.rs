//! The self-play training loop.
//!
//! Every iteration plays one round of games, ingests them into the replay
//! buffer, trains once the buffer is warm, and checkpoints the policy
//! together with the self-play hyperparameters it was trained under. All of
//! it runs on the calling thread; only the self-play games themselves are
//! spread across the worker pool.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::checkpoint::{CheckpointError, CheckpointStore, PolicySnapshot};
use crate::config::{ConfigError, SelfPlayParams, TrainingConfig};
use crate::neural::policy::{PolicyCallback, PolicyError, PolicyService, TrainStats};
use crate::replay::{BufferError, ReplayBuffer};
use crate::selfplay::{EngineError, RoundSummary, SearchEngine, WorkerError, WorkerPool};
use crate::training::summary::{SummaryRow, SummaryWriter};

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("replay buffer: {0}")]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("self-play: {0}")]
    Engine(#[from] EngineError),

    #[error("worker pool: {0}")]
    Worker(#[from] WorkerError),

    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("summary: {0}")]
    Summary(#[from] csv::Error),

    #[error("{step}; shutdown also failed: {shutdown}")]
    ShutdownAfterFailure {
        step: Box<TrainingError>,
        shutdown: Box<TrainingError>,
    },
}

/// Cooperative stop flag, checked between rounds.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Warming,
    Training,
    Checkpointing,
    Stopped,
}

/// Outcome of one call to [`TrainingLoop::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Training epoch after this step.
    pub epoch: u64,
    pub round: RoundSummary,
    pub buffer_len: usize,
    /// Loss probe, `None` while warming up.
    pub stats: Option<TrainStats>,
    pub checkpoint: Option<PathBuf>,
}

pub struct TrainingLoop<P: PolicyService, E: SearchEngine> {
    config: TrainingConfig,
    policy: P,
    engine: Arc<E>,
    pool: Option<WorkerPool>,
    buffer: ReplayBuffer,
    store: CheckpointStore,
    summary: SummaryWriter,
    self_play: SelfPlayParams,
    /// Snapshot of the current weights, shared by rounds and checkpoints of the same epoch.
    snapshot: Option<Arc<PolicySnapshot>>,
    epoch: u64,
    phase: Phase,
    stop: StopSignal,
}

impl<P: PolicyService, E: SearchEngine> std::fmt::Debug for TrainingLoop<P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingLoop")
            .field("config", &self.config)
            .field("self_play", &self.self_play)
            .field("epoch", &self.epoch)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<P, E> TrainingLoop<P, E>
where
    P: PolicyService + 'static,
    E: SearchEngine + 'static,
{
    /// Build a fresh run, or resume one when `config.load_epoch` is set.
    pub fn new(config: TrainingConfig, engine: Arc<E>, stop: StopSignal) -> Result<Self, TrainingError> {
        config.validate()?;

        let model_config = config.model_config(P::ARCHITECTURE);
        let store = CheckpointStore::new(config.run_dir());

        let (policy, self_play, epoch, snapshot) = match config.load_epoch {
            Some(epoch) => {
                let snapshot = store.load_checked(epoch as u64, &model_config)?;
                snapshot.self_play.validate()?;
                if snapshot.self_play != config.self_play {
                    log::warn!(
                        "⚠️ Self-play parameters restored from epoch {} override the configured ones",
                        epoch
                    );
                }
                let policy = P::from_snapshot(&snapshot)?;
                log::info!("📂 Resumed run '{}' from epoch {}", config.name, epoch);
                (policy, snapshot.self_play.clone(), epoch as u64, Some(Arc::new(snapshot)))
            }
            None => (P::new(&model_config)?, config.self_play.clone(), 0, None),
        };

        let buffer = match config.seed {
            Some(seed) => ReplayBuffer::with_seed(config.max_buffer, config.board_size, seed),
            None => ReplayBuffer::new(config.max_buffer, config.board_size),
        };

        let pool = if config.num_workers > 1 {
            Some(WorkerPool::start::<P, E>(config.num_workers, Arc::clone(&engine))?)
        } else {
            None
        };

        let summary = SummaryWriter::open(&config.summary_dir, &config.name)?;

        Ok(Self {
            config,
            policy,
            engine,
            pool,
            buffer,
            store,
            summary,
            self_play,
            snapshot,
            epoch,
            phase: Phase::Idle,
            stop,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn self_play(&self) -> &SelfPlayParams {
        &self.self_play
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn summary_path(&self) -> &std::path::Path {
        self.summary.path()
    }

    /// Run until the stop signal is raised or `max_epochs` training epochs
    /// have completed, then shut the worker pool down.
    pub fn run(&mut self) -> Result<(), TrainingError> {
        let start_epoch = self.epoch;
        let result = loop {
            if self.stop.is_raised() {
                log::info!("🛑 Stop requested at epoch {}", self.epoch);
                break Ok(());
            }
            if let Some(max) = self.config.max_epochs {
                if self.epoch - start_epoch >= max as u64 {
                    log::info!("✅ Completed {} training epochs", max);
                    break Ok(());
                }
            }
            if let Err(e) = self.step() {
                break Err(e);
            }
        };

        match (result, self.shutdown()) {
            (Ok(()), shutdown) => shutdown,
            (Err(step), Ok(())) => Err(step),
            (Err(step), Err(shutdown)) => {
                log::error!("❌ Worker pool shutdown failed after '{}': {}", step, shutdown);
                Err(TrainingError::ShutdownAfterFailure {
                    step: Box::new(step),
                    shutdown: Box::new(shutdown),
                })
            }
        }
    }

    /// One generation round, followed by training and checkpointing once warm.
    pub fn step(&mut self) -> Result<StepReport, TrainingError> {
        self.phase = Phase::Generating;
        let round = self.generate()?;

        let mut report = StepReport {
            epoch: self.epoch,
            round,
            buffer_len: self.buffer.len(),
            stats: None,
            checkpoint: None,
        };

        if self.buffer.len() < self.config.start_train {
            self.phase = Phase::Warming;
            log::info!(
                "🔥 Warming up: {}/{} samples in buffer",
                self.buffer.len(),
                self.config.start_train
            );
            return Ok(report);
        }

        self.phase = Phase::Training;
        let stats = self.train()?;
        self.epoch += 1;
        self.snapshot = None;
        self.summary
            .write(&SummaryRow::new(self.epoch, self.buffer.len(), &stats))?;
        log::info!(
            "📈 Epoch {}: value_mse={:.4} policy_ce={:.4} loss={:.4}",
            self.epoch,
            stats.value_mse,
            stats.policy_ce,
            stats.loss
        );
        report.epoch = self.epoch;
        report.stats = Some(stats);

        if self.epoch % self.config.ckpt_interval as u64 == 0 {
            self.phase = Phase::Checkpointing;
            report.checkpoint = Some(self.checkpoint()?);
            if self.config.clear_half_on_checkpoint {
                self.buffer.clear_half();
                log::info!("🧹 Replay buffer halved to {} samples", self.buffer.len());
            }
        }
        report.buffer_len = self.buffer.len();
        Ok(report)
    }

    /// Stop the worker pool. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), TrainingError> {
        if let Some(pool) = self.pool.as_mut() {
            pool.terminate()?;
        }
        self.phase = Phase::Stopped;
        Ok(())
    }

    fn generate(&mut self) -> Result<RoundSummary, TrainingError> {
        let games = self.config.games_per_round;
        let summary = if self.pool.is_some() {
            let snapshot = self.current_snapshot()?;
            match self.pool.as_mut() {
                Some(pool) => pool.play(games, &mut self.buffer, snapshot)?,
                None => RoundSummary::default(),
            }
        } else {
            let callback = PolicyCallback::new(&self.policy);
            let mut summary = RoundSummary::default();
            for _ in 0..games {
                for record in self.engine.self_play(&callback, &self.self_play)? {
                    summary.moves += self.buffer.push_game(&record)?;
                    summary.games += 1;
                }
            }
            summary
        };

        log::info!(
            "🎮 Self-play round: {} games, {} moves, buffer {}",
            summary.games,
            summary.moves,
            self.buffer.len()
        );
        Ok(summary)
    }

    fn train(&mut self) -> Result<TrainStats, TrainingError> {
        for _ in 0..self.config.batch_size {
            let batch = self.buffer.sample(self.config.mini_batch)?;
            self.policy.train(&batch)?;
        }
        let probe = self.buffer.sample(self.config.mini_batch)?;
        Ok(self.policy.loss(&probe)?)
    }

    fn checkpoint(&mut self) -> Result<PathBuf, TrainingError> {
        let snapshot = self.current_snapshot()?;
        Ok(self.store.save(&snapshot)?)
    }

    /// Snapshot of the live policy at the current epoch, built at most once per epoch.
    fn current_snapshot(&mut self) -> Result<Arc<PolicySnapshot>, TrainingError> {
        if let Some(snapshot) = &self.snapshot {
            if snapshot.version == self.epoch {
                return Ok(Arc::clone(snapshot));
            }
        }
        let snapshot = Arc::new(self.policy.snapshot(self.epoch, &self.self_play)?);
        self.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
