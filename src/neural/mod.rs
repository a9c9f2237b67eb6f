//! Policies: the contract the search engine calls through, and the models
//! that implement it.

pub mod model_io;
pub mod policy;
pub mod random_policy;
pub mod weighted_policy;

pub use policy::{Evaluation, Evaluator, PolicyCallback, PolicyError, PolicyService, TrainStats};
pub use random_policy::RandomPolicy;
pub use weighted_policy::WeightedPolicy;
