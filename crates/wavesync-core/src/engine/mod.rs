//! Engine adapter surface
//!
//! - [`WaveEngine`] / [`LiveRegion`]: what wavesync requires of an engine
//! - [`EngineEvent`] / [`RegionEvent`]: the event names it bridges
//! - [`HeadlessEngine`]: in-memory implementation (no decode, no drawing)

mod adapter;
mod events;
pub mod headless;

pub use adapter::{EventHandler, ListenerId, LiveRegion, PluginKind, PluginSpec, WaveEngine};
pub use events::{
    callback_slot_name, EngineEvent, RegionEvent, ENGINE_SLOT_PREFIX, REGION_SLOT_PREFIX,
};
pub use headless::{EngineCall, HeadlessEngine, HeadlessRegion};
