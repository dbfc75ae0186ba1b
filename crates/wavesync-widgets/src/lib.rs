//! Declarative reconciliation for stateful waveform engines
//!
//! A consumer describes what the waveform view should look like as a
//! [`Snapshot`] plus a region mapping; this crate issues the engine calls
//! that make it so and bridges engine events back to callbacks.
//!
//! ## Architecture
//!
//! - **sync**: [`WaveSynchronizer`] owns the engine, diffs snapshots, handles
//!   the ready/reload lifecycle and teardown
//! - **regions**: minimal-diff [`reconcile`] of region maps against live regions
//! - **bridge**: engine/region handlers → flume queue → [`Callbacks`]
//! - **resize**: leading-edge [`ResizeThrottle`] for window resizes
//! - **overlay**: timeline/minimap plugins installed once the engine is ready
//! - **host**: [`HostEnvironment`] (mount point, media lookup, resize events)
//!
//! Nothing here spawns threads or reads a clock: the host drives everything
//! through [`WaveSynchronizer::pump`] with the current `Instant`.

pub mod bridge;
pub mod host;
pub mod overlay;
pub mod regions;
pub mod resize;
pub mod sync;

pub use bridge::{Callback, Callbacks, EventOrigin, EventPayload, QueuedEvent};
pub use host::{HeadlessHost, HostEnvironment, ResizeNotifier};
pub use overlay::{OverlayContext, OverlayPlugin};
pub use regions::{reconcile, ReconcileReport, RegionLayer};
pub use resize::ResizeThrottle;
pub use sync::{Phase, Snapshot, UpdateHandle, WaveSynchronizer};
