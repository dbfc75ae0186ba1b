//! Event name tables
//!
//! Engines emit events by name. Wavesync bridges a fixed set of them to
//! declarative callback slots whose names follow one convention: split the
//! event name on `-`, capitalise every part, prefix with `on` (engine events)
//! or `onSingleRegion` (per-region events).

use serde::{Deserialize, Serialize};

/// Prefix for engine-level callback slots
pub const ENGINE_SLOT_PREFIX: &str = "on";

/// Prefix for per-region callback slots
pub const REGION_SLOT_PREFIX: &str = "onSingleRegion";

/// Build a callback slot name from an event name
///
/// `callback_slot_name("on", "region-in")` → `"onRegionIn"`
pub fn callback_slot_name(prefix: &str, event: &str) -> String {
    let mut slot = String::with_capacity(prefix.len() + event.len());
    slot.push_str(prefix);
    for part in event.split('-') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            slot.extend(first.to_uppercase());
            slot.push_str(chars.as_str());
        }
    }
    slot
}

/// Events emitted by the engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────
    /// Playhead advanced during playback; carries the position in seconds
    Audioprocess,
    /// Decode or fetch failure inside the engine; carries a message
    Error,
    Finish,
    /// Load progress; carries a percentage
    Loading,
    Mouseup,
    Pause,
    Play,
    /// Audio decoded and waveform drawn; duration is now known
    Ready,
    Scroll,
    /// Playhead moved by a seek; carries the normalized position
    Seek,
    Zoom,

    // ─────────────────────────────────────────────────────────────
    // Regions plugin (carry the region id as first argument)
    // ─────────────────────────────────────────────────────────────
    RegionIn,
    RegionOut,
    RegionMouseenter,
    RegionMouseleave,
    RegionClick,
    RegionDblclick,
    RegionUpdated,
    RegionUpdateEnd,
    RegionRemoved,
    RegionPlay,
}

impl EngineEvent {
    /// The fixed set every synchronizer subscribes to
    pub const PLAYBACK: [EngineEvent; 11] = [
        EngineEvent::Audioprocess,
        EngineEvent::Error,
        EngineEvent::Finish,
        EngineEvent::Loading,
        EngineEvent::Mouseup,
        EngineEvent::Pause,
        EngineEvent::Play,
        EngineEvent::Ready,
        EngineEvent::Scroll,
        EngineEvent::Seek,
        EngineEvent::Zoom,
    ];

    /// Engine-level events of the regions plugin
    pub const REGIONS: [EngineEvent; 10] = [
        EngineEvent::RegionIn,
        EngineEvent::RegionOut,
        EngineEvent::RegionMouseenter,
        EngineEvent::RegionMouseleave,
        EngineEvent::RegionClick,
        EngineEvent::RegionDblclick,
        EngineEvent::RegionUpdated,
        EngineEvent::RegionUpdateEnd,
        EngineEvent::RegionRemoved,
        EngineEvent::RegionPlay,
    ];

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Audioprocess => "audioprocess",
            EngineEvent::Error => "error",
            EngineEvent::Finish => "finish",
            EngineEvent::Loading => "loading",
            EngineEvent::Mouseup => "mouseup",
            EngineEvent::Pause => "pause",
            EngineEvent::Play => "play",
            EngineEvent::Ready => "ready",
            EngineEvent::Scroll => "scroll",
            EngineEvent::Seek => "seek",
            EngineEvent::Zoom => "zoom",
            EngineEvent::RegionIn => "region-in",
            EngineEvent::RegionOut => "region-out",
            EngineEvent::RegionMouseenter => "region-mouseenter",
            EngineEvent::RegionMouseleave => "region-mouseleave",
            EngineEvent::RegionClick => "region-click",
            EngineEvent::RegionDblclick => "region-dblclick",
            EngineEvent::RegionUpdated => "region-updated",
            EngineEvent::RegionUpdateEnd => "region-update-end",
            EngineEvent::RegionRemoved => "region-removed",
            EngineEvent::RegionPlay => "region-play",
        }
    }

    /// Look up an event by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::PLAYBACK
            .iter()
            .chain(Self::REGIONS.iter())
            .copied()
            .find(|event| event.name() == name)
    }

    /// Callback slot this event is bridged to (e.g. `onRegionIn`)
    pub fn slot_name(&self) -> String {
        callback_slot_name(ENGINE_SLOT_PREFIX, self.name())
    }

    /// Whether this event belongs to the regions plugin
    pub fn is_region_event(&self) -> bool {
        Self::REGIONS.contains(self)
    }
}

/// Events emitted by an individual live region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionEvent {
    In,
    Out,
    Remove,
    Update,
    Click,
    Dbclick,
    Over,
    Leave,
}

impl RegionEvent {
    pub const ALL: [RegionEvent; 8] = [
        RegionEvent::In,
        RegionEvent::Out,
        RegionEvent::Remove,
        RegionEvent::Update,
        RegionEvent::Click,
        RegionEvent::Dbclick,
        RegionEvent::Over,
        RegionEvent::Leave,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RegionEvent::In => "in",
            RegionEvent::Out => "out",
            RegionEvent::Remove => "remove",
            RegionEvent::Update => "update",
            RegionEvent::Click => "click",
            RegionEvent::Dbclick => "dbclick",
            RegionEvent::Over => "over",
            RegionEvent::Leave => "leave",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.name() == name)
    }

    /// Callback slot this event is bridged to (e.g. `onSingleRegionClick`)
    pub fn slot_name(&self) -> String {
        callback_slot_name(REGION_SLOT_PREFIX, self.name())
    }
}
