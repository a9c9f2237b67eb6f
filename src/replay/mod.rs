pub mod buffer;

pub use buffer::{BufferError, ReplayBuffer, ReplayEntry, SampleBatch};
