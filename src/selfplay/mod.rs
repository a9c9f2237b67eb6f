//! Game generation: the search engine and the worker pool that runs it.

pub mod engine;
pub mod interactive;
pub mod worker_pool;

pub use engine::{EngineError, PolicyGuidedEngine, SearchEngine};
pub use worker_pool::{Request, Response, RoundSummary, WorkerError, WorkerPool};
