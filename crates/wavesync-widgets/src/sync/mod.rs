//! Playback synchronizer: snapshot diffing, ready entry, teardown

mod snapshot;
mod synchronizer;

pub use snapshot::Snapshot;
pub use synchronizer::{Phase, UpdateHandle, WaveSynchronizer};
