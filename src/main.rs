use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use connect6_zero::checkpoint::CheckpointStore;
use connect6_zero::config::{SelfPlayParams, TrainingConfig};
use connect6_zero::logging::setup_logging;
use connect6_zero::neural::{Evaluator, PolicyCallback, PolicyService, RandomPolicy, WeightedPolicy};
use connect6_zero::selfplay::PolicyGuidedEngine;
use connect6_zero::training::{StopSignal, TrainingLoop};
use connect6_zero::{Connect6ZeroError, PolicySnapshot};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyKind {
    Weighted,
    Random,
}

#[derive(Parser, Debug)]
#[command(name = "connect6_zero", version, about)]
struct Cli {
    /// Also write rotated log files into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the self-play training loop
    Train(TrainArgs),
    /// Play against a saved checkpoint on stdin/stdout
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct SelfPlayArgs {
    /// Simulations per move
    #[arg(long, default_value_t = 800)]
    num_simulation: usize,

    /// Boards expanded per policy call
    #[arg(long, default_value_t = 1)]
    num_expansion: usize,

    /// Dirichlet noise ratio at the root
    #[arg(long, default_value_t = 0.25)]
    epsilon: f32,

    #[arg(long, default_value_t = 0.03)]
    dirichlet_alpha: f64,

    #[arg(long, default_value_t = 1.0)]
    c_puct: f32,

    /// Log every move
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Games per engine call
    #[arg(long, default_value_t = 1)]
    num_game_thread: usize,
}

impl From<SelfPlayArgs> for SelfPlayParams {
    fn from(args: SelfPlayArgs) -> Self {
        Self {
            num_simulation: args.num_simulation,
            num_expansion: args.num_expansion,
            epsilon: args.epsilon,
            dirichlet_alpha: args.dirichlet_alpha,
            c_puct: args.c_puct,
            debug: args.debug,
            num_game_thread: args.num_game_thread,
        }
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Run name, used for the checkpoint and summary paths
    #[arg(long, default_value = "default")]
    name: String,

    #[arg(long, value_enum, default_value = "weighted")]
    policy: PolicyKind,

    #[arg(long, default_value_t = 15)]
    board_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0.9)]
    momentum: f64,

    /// Replay buffer capacity
    #[arg(long, default_value_t = 10_000)]
    max_buffer: usize,

    /// Buffer length required before training starts
    #[arg(long, default_value_t = 2_000)]
    start_train: usize,

    /// Gradient steps per epoch
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Samples per gradient step
    #[arg(long, default_value_t = 1_024)]
    mini_batch: usize,

    /// Epochs between checkpoints
    #[arg(long, default_value_t = 100)]
    ckpt_interval: usize,

    /// Halve the replay buffer after each checkpoint
    #[arg(long, default_value_t = false)]
    clear_half: bool,

    /// Self-play worker threads (1 plays in process)
    #[arg(short = 'w', long, default_value_t = 1)]
    num_workers: usize,

    /// Self-play requests per round
    #[arg(short = 'g', long, default_value_t = 1)]
    games_per_round: usize,

    #[arg(long, default_value = "weighted/ckpt")]
    ckpt_dir: PathBuf,

    #[arg(long, default_value = "weighted/summary")]
    summary_dir: PathBuf,

    /// Resume from this checkpoint epoch
    #[arg(long)]
    load_epoch: Option<usize>,

    /// Stop after this many training epochs
    #[arg(long)]
    max_epochs: Option<usize>,

    /// Seed for replay sampling and self-play
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    self_play: SelfPlayArgs,
}

impl TrainArgs {
    fn into_config(self) -> (PolicyKind, Option<u64>, TrainingConfig) {
        let config = TrainingConfig {
            name: self.name,
            board_size: self.board_size,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            max_buffer: self.max_buffer,
            start_train: self.start_train,
            batch_size: self.batch_size,
            mini_batch: self.mini_batch,
            ckpt_interval: self.ckpt_interval,
            clear_half_on_checkpoint: self.clear_half,
            num_workers: self.num_workers,
            games_per_round: self.games_per_round,
            ckpt_dir: self.ckpt_dir,
            summary_dir: self.summary_dir,
            load_epoch: self.load_epoch,
            max_epochs: self.max_epochs,
            seed: self.seed,
            self_play: self.self_play.into(),
        };
        (self.policy, self.seed, config)
    }
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(long, default_value = "default")]
    name: String,

    #[arg(long, default_value = "weighted/ckpt")]
    ckpt_dir: PathBuf,

    /// Checkpoint epoch to play against (latest when omitted)
    #[arg(long)]
    epoch: Option<u64>,

    /// Override the simulations per move stored in the checkpoint
    #[arg(long)]
    num_simulation: Option<usize>,
}

fn train<P: PolicyService + 'static>(
    config: TrainingConfig,
    seed: Option<u64>,
    stop: StopSignal,
) -> Result<(), Connect6ZeroError> {
    let engine = Arc::new(match seed {
        Some(seed) => PolicyGuidedEngine::with_seed(seed),
        None => PolicyGuidedEngine::new(),
    });
    let mut training = TrainingLoop::<P, _>::new(config, engine, stop)?;
    training.run()?;
    log::info!("Training stopped at epoch {}", training.epoch());
    Ok(())
}

fn load_opponent(snapshot: &PolicySnapshot) -> Result<Box<dyn Evaluator>, Connect6ZeroError> {
    let architecture = snapshot.model.architecture.as_str();
    if architecture == RandomPolicy::ARCHITECTURE {
        Ok(Box::new(RandomPolicy::from_snapshot(snapshot)?))
    } else {
        Ok(Box::new(WeightedPolicy::from_snapshot(snapshot)?))
    }
}

fn play(args: PlayArgs) -> Result<(), Connect6ZeroError> {
    let store = CheckpointStore::new(args.ckpt_dir.join(&args.name));
    let epoch = match args.epoch {
        Some(epoch) => epoch,
        None => store.latest_epoch()?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no checkpoint in {}", store.run_dir().display()),
            )
        })?,
    };

    let snapshot = store.load(epoch)?;
    log::info!(
        "📂 Loaded epoch {} ({}, board {})",
        epoch,
        snapshot.model.architecture,
        snapshot.model.board_size
    );

    let mut params = snapshot.self_play.clone();
    if let Some(num_simulation) = args.num_simulation {
        params.num_simulation = num_simulation;
    }
    params.validate()?;

    let opponent = load_opponent(&snapshot)?;
    let callback = PolicyCallback::new(opponent.as_ref());
    let engine = PolicyGuidedEngine::new();
    let record = engine.play_with(&callback, &params, io::stdin().lock(), io::stdout())?;
    log::info!("Game finished: {} after {} stones", record.winner, record.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = setup_logging(cli.log_dir.as_deref())?;

    match cli.command {
        Command::Train(args) => {
            let (kind, seed, config) = args.into_config();
            let stop = StopSignal::new();

            let signal = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Ctrl-C received, stopping after the current round");
                    signal.raise();
                }
            });

            tokio::task::spawn_blocking(move || match kind {
                PolicyKind::Weighted => train::<WeightedPolicy>(config, seed, stop),
                PolicyKind::Random => train::<RandomPolicy>(config, seed, stop),
            })
            .await??;
        }
        Command::Play(args) => {
            tokio::task::spawn_blocking(move || play(args)).await??;
        }
    }

    Ok(())
}
