//! Versioned policy snapshots and their on-disk store.

pub mod snapshot;
pub mod store;

pub use snapshot::{PolicySnapshot, SnapshotMetadata};
pub use store::{CheckpointError, CheckpointStore};
