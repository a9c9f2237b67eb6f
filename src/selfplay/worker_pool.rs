//! Fixed pool of self-play worker threads.
//!
//! Workers share one request channel and one response channel. A `Play`
//! request carries the round's snapshot; each worker keeps a replica built
//! from the last snapshot it saw and rebuilds it whenever a request carries
//! a different `Arc`. A `Stop` request is answered with `Exited` and ends
//! the thread.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::checkpoint::PolicySnapshot;
use crate::game::GameRecord;
use crate::neural::policy::{PolicyCallback, PolicyService};
use crate::replay::{BufferError, ReplayBuffer};
use crate::selfplay::engine::{EngineError, SearchEngine};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        source: std::io::Error,
    },

    #[error("worker {worker} failed on request {seq}: {message}")]
    Failed {
        worker: usize,
        seq: u64,
        message: String,
    },

    #[error("worker {worker} exited while requests were pending")]
    UnexpectedExit { worker: usize },

    #[error("worker channel disconnected")]
    Disconnected,

    #[error("expected {expected} worker acknowledgments, received {received}")]
    MissingAck { expected: usize, received: usize },

    #[error("worker thread {0} panicked")]
    Panicked(String),

    #[error("worker pool has been terminated")]
    NotRunning,

    #[error("worker {worker} returned a record the buffer rejected on request {seq}: {source}")]
    Rejected {
        worker: usize,
        seq: u64,
        source: BufferError,
    },
}

#[derive(Debug)]
pub enum Request {
    Play {
        seq: u64,
        snapshot: Arc<PolicySnapshot>,
    },
    Stop,
}

#[derive(Debug)]
pub enum Response {
    Games {
        worker: usize,
        seq: u64,
        records: Vec<GameRecord>,
    },
    Failed {
        worker: usize,
        seq: u64,
        error: String,
    },
    Exited {
        worker: usize,
    },
}

/// What one call to [`WorkerPool::play`] added to the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub games: usize,
    pub moves: usize,
}

pub struct WorkerPool {
    requests: Sender<Request>,
    responses: Receiver<Response>,
    handles: Vec<JoinHandle<()>>,
    next_seq: u64,
    running: bool,
}

impl WorkerPool {
    /// Spawn `num_workers` threads, each building `P` replicas and playing with `engine`.
    pub fn start<P, E>(num_workers: usize, engine: Arc<E>) -> Result<Self, WorkerError>
    where
        P: PolicyService + 'static,
        E: SearchEngine + 'static,
    {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (response_tx, response_rx) = unbounded::<Response>();

        let mut pool = Self {
            requests: request_tx,
            responses: response_rx,
            handles: Vec::with_capacity(num_workers),
            next_seq: 0,
            running: true,
        };

        for worker in 0..num_workers {
            let engine = Arc::clone(&engine);
            let requests = request_rx.clone();
            let responses = response_tx.clone();
            // The replica is created on the worker thread, so `P` never crosses threads.
            let spawned = thread::Builder::new()
                .name(format!("self-play-{worker}"))
                .spawn(move || {
                    Worker::<P, E> {
                        id: worker,
                        engine,
                        requests,
                        responses,
                        replica: None,
                    }
                    .run()
                });
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    if let Err(e) = pool.terminate() {
                        log::error!("cleanup after failed spawn: {}", e);
                    }
                    return Err(WorkerError::Spawn { worker, source });
                }
            }
        }

        log::info!("🚀 Started {} self-play workers", num_workers);
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run `num` self-play requests against `snapshot` and push every
    /// returned record into `buffer` in arrival order.
    ///
    /// Exactly `num` responses are collected before returning, so a failed
    /// request is reported only once the round is fully drained.
    pub fn play(
        &mut self,
        num: usize,
        buffer: &mut ReplayBuffer,
        snapshot: Arc<PolicySnapshot>,
    ) -> Result<RoundSummary, WorkerError> {
        if !self.running {
            return Err(WorkerError::NotRunning);
        }

        for _ in 0..num {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.requests
                .send(Request::Play {
                    seq,
                    snapshot: Arc::clone(&snapshot),
                })
                .map_err(|_| WorkerError::Disconnected)?;
        }

        let mut summary = RoundSummary::default();
        let mut first_error = None;
        for _ in 0..num {
            match self.responses.recv().map_err(|_| WorkerError::Disconnected)? {
                Response::Games {
                    worker,
                    seq,
                    records,
                } => {
                    for record in &records {
                        match buffer.push_game(record) {
                            Ok(moves) => {
                                summary.moves += moves;
                                summary.games += 1;
                            }
                            Err(source) => {
                                log::error!("❌ worker {} request {}: {}", worker, seq, source);
                                first_error.get_or_insert(WorkerError::Rejected { worker, seq, source });
                            }
                        }
                    }
                    log::debug!(
                        "worker {} finished request {} with {} games",
                        worker,
                        seq,
                        records.len()
                    );
                }
                Response::Failed { worker, seq, error } => {
                    log::error!("❌ worker {} failed request {}: {}", worker, seq, error);
                    first_error.get_or_insert(WorkerError::Failed {
                        worker,
                        seq,
                        message: error,
                    });
                }
                Response::Exited { worker } => {
                    first_error.get_or_insert(WorkerError::UnexpectedExit { worker });
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }

    /// Stop every worker, wait for one acknowledgment each and join the threads.
    pub fn terminate(&mut self) -> Result<(), WorkerError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        let expected = self.handles.len();
        for _ in 0..expected {
            self.requests
                .send(Request::Stop)
                .map_err(|_| WorkerError::Disconnected)?;
        }

        let mut received = 0;
        while received < expected {
            match self.responses.recv() {
                Ok(Response::Exited { worker }) => {
                    log::debug!("worker {} exited", worker);
                    received += 1;
                }
                Ok(other) => log::warn!("discarding response received during shutdown: {:?}", other),
                Err(_) => return Err(WorkerError::MissingAck { expected, received }),
            }
        }

        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("self-play").to_string();
            handle.join().map_err(|_| WorkerError::Panicked(name))?;
        }
        log::info!("🛑 Self-play workers terminated");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.running {
            log::error!("worker pool dropped while running, terminating");
            if let Err(e) = self.terminate() {
                log::error!("failed to terminate worker pool: {}", e);
            }
        }
    }
}

struct Worker<P, E> {
    id: usize,
    engine: Arc<E>,
    requests: Receiver<Request>,
    responses: Sender<Response>,
    /// Last snapshot seen and the model rebuilt from it. Held so the
    /// pointer cannot be reused by a different snapshot.
    replica: Option<(Arc<PolicySnapshot>, P)>,
}

impl<P: PolicyService, E: SearchEngine> Worker<P, E> {
    fn run(mut self) {
        while let Ok(request) = self.requests.recv() {
            let response = match request {
                Request::Stop => {
                    let _ = self.responses.send(Response::Exited { worker: self.id });
                    return;
                }
                Request::Play { seq, snapshot } => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.play(snapshot)));
                    match outcome {
                        Ok(Ok(records)) => Response::Games {
                            worker: self.id,
                            seq,
                            records,
                        },
                        Ok(Err(e)) => Response::Failed {
                            worker: self.id,
                            seq,
                            error: e.to_string(),
                        },
                        Err(_) => {
                            // The replica may be half-updated after a panic.
                            self.replica = None;
                            Response::Failed {
                                worker: self.id,
                                seq,
                                error: "self-play panicked".to_string(),
                            }
                        }
                    }
                }
            };
            if self.responses.send(response).is_err() {
                return;
            }
        }
    }

    fn play(&mut self, snapshot: Arc<PolicySnapshot>) -> Result<Vec<GameRecord>, EngineError> {
        let policy = match self.replica.take() {
            Some((seen, policy)) if Arc::ptr_eq(&seen, &snapshot) => policy,
            _ => {
                log::debug!("worker {} loading snapshot {}", self.id, snapshot.version);
                P::from_snapshot(&snapshot)?
            }
        };
        let (snapshot, policy) = self.replica.insert((snapshot, policy));
        let callback = PolicyCallback::new(&*policy);
        self.engine.self_play(&callback, &snapshot.self_play)
    }
}
