//! Engine adapter capability surface
//!
//! Wavesync never owns decode, playback or drawing. It drives an engine
//! through [`WaveEngine`] and the engine's live regions through
//! [`LiveRegion`]. Both are event emitters: handlers registered with `on`
//! are invoked synchronously, in emission order, on the caller's thread.

use serde::{Deserialize, Serialize};

use super::events::{EngineEvent, RegionEvent};
use crate::config::EngineConfig;
use crate::error::{LoadError, WaveResult};
use crate::types::{Attributes, EventArg, MediaHandle, MountPoint, Peaks, RegionDescriptor, RegionId, SharedBytes};

/// Handler invoked with the raw arguments of an event
pub type EventHandler = Box<dyn FnMut(&[EventArg])>;

/// Identifies one registered handler so it can be removed on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Overlay plugins an engine can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Regions,
    Timeline,
    Minimap,
}

impl PluginKind {
    pub fn name(&self) -> &'static str {
        match self {
            PluginKind::Regions => "regions",
            PluginKind::Timeline => "timeline",
            PluginKind::Minimap => "minimap",
        }
    }
}

/// Plugin-create-and-init request
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSpec {
    pub kind: PluginKind,
    /// Opaque options forwarded to the plugin
    pub options: Attributes,
    /// Separate surface for plugins that draw outside the waveform (timeline)
    pub container: Option<MountPoint>,
}

/// A mutable region object owned by the engine
///
/// Implementations are shared handles: clones refer to the same engine-side
/// region, and mutation goes through `&self`. Holders borrow the region,
/// they never own it.
pub trait LiveRegion: Clone {
    fn id(&self) -> RegionId;

    /// Current start in seconds
    fn start(&self) -> f64;

    /// Current end in seconds
    fn end(&self) -> f64;

    /// Move the region to new bounds
    fn update(&self, start: f64, end: f64);

    /// Remove the region from the engine; emits the region's `remove` event
    fn remove(&self);

    fn on(&self, event: RegionEvent, handler: EventHandler) -> ListenerId;

    /// Remove every handler registered for `event`
    fn un(&self, event: RegionEvent);
}

/// The imperative engine wavesync drives
pub trait WaveEngine {
    type Region: LiveRegion;

    /// Construct an engine instance drawing into `config.container`
    fn create(config: EngineConfig) -> WaveResult<Self>
    where
        Self: Sized;

    // ─────────────────────────────────────────────────────────────
    // Loading (completion is signalled by the `ready` event)
    // ─────────────────────────────────────────────────────────────
    fn load_url(&mut self, url: &str, peaks: Option<&Peaks>) -> Result<(), LoadError>;
    fn load_bytes(&mut self, bytes: &SharedBytes, peaks: Option<&Peaks>) -> Result<(), LoadError>;
    fn load_media(&mut self, media: MediaHandle, peaks: Option<&Peaks>) -> Result<(), LoadError>;

    // ─────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    /// Seek to a normalized position (0.0 to 1.0)
    fn seek_to(&mut self, position: f64);
    /// Seek to a normalized position and scroll it to the center of the view
    fn seek_and_center(&mut self, position: f64);
    fn set_volume(&mut self, volume: f64);
    /// Zoom to `px_per_sec` pixels per second of audio
    fn zoom(&mut self, px_per_sec: f64);
    fn set_playback_rate(&mut self, rate: f64);
    /// Track duration in seconds; 0.0 until ready
    fn duration(&self) -> f64;

    /// Redraw the waveform for the current container size
    fn draw_buffer(&mut self);

    /// Release the engine. Not required to be idempotent.
    fn destroy(&mut self);

    // ─────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────
    fn on(&mut self, event: EngineEvent, handler: EventHandler) -> ListenerId;
    /// Remove every handler registered for `event`
    fn un(&mut self, event: EngineEvent);
    /// Remove a single handler
    fn un_listener(&mut self, id: ListenerId);

    // ─────────────────────────────────────────────────────────────
    // Plugins and regions
    // ─────────────────────────────────────────────────────────────
    fn add_plugin(&mut self, plugin: PluginSpec);
    /// Create a live region (requires the regions plugin)
    fn add_region(&mut self, region: &RegionDescriptor) -> Self::Region;
    /// Handles to every live region
    fn regions(&self) -> Vec<Self::Region>;
}
