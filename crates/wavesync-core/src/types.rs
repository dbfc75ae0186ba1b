//! Common types for wavesync
//!
//! Audio sources are modelled as a tagged union so the loader is picked by
//! exhaustive matching instead of inspecting the runtime type of a value.
//! Byte payloads and peaks are shared (`Arc`) and compare by identity: a
//! snapshot that hands the same buffer back does not count as a new source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Caller-assigned region identifier
pub type RegionId = String;

/// Declarative region mapping, keyed by region id
pub type RegionMap = BTreeMap<RegionId, RegionDescriptor>;

/// Opaque engine-specific attributes (colors, drag/resize flags, ...)
pub type Attributes = BTreeMap<String, serde_yaml::Value>;

// =============================================================================
// Audio payloads
// =============================================================================

/// Raw encoded audio bytes (blob/file contents)
///
/// Equality is identity: two `SharedBytes` are equal only when they point at
/// the same allocation. Content is never compared.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedBytes(Arc<[u8]>);

impl SharedBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for SharedBytes {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for SharedBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

/// Precomputed waveform peaks
///
/// Supplying peaks lets the engine draw without analysing the decoded audio.
/// Like [`SharedBytes`], equality is identity.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peaks(Arc<[f32]>);

impl Peaks {
    pub fn new(peaks: impl Into<Arc<[f32]>>) -> Self {
        Self(peaks.into())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Peaks {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Peaks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peaks({} values)", self.0.len())
    }
}

impl From<Vec<f32>> for Peaks {
    fn from(peaks: Vec<f32>) -> Self {
        Self(peaks.into())
    }
}

/// Handle to a host media element (e.g. an `<audio>` element the host owns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(pub u64);

/// Reference to a media element: either a resolved handle or a selector the
/// host environment resolves at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRef {
    Selector(String),
    Handle(MediaHandle),
}

/// Declared audio source
///
/// Changing the active variant, or the identity of the payload inside it,
/// constitutes a reload. In YAML files a source is written as a single-key
/// map (`url: track.ogg`), read through `serde_yaml::with::singleton_map_recursive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    /// Loaded by reference through the engine's own fetcher
    Url(String),
    /// Loaded from encoded bytes already in memory
    Bytes(SharedBytes),
    /// Played through an external media element
    Media(MediaRef),
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        AudioSource::Url(url.into())
    }

    pub fn bytes(bytes: impl Into<SharedBytes>) -> Self {
        AudioSource::Bytes(bytes.into())
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        AudioSource::Media(MediaRef::Selector(selector.into()))
    }

    pub fn media(handle: MediaHandle) -> Self {
        AudioSource::Media(MediaRef::Handle(handle))
    }

    /// Whether this source needs the media-element backend
    pub fn is_media(&self) -> bool {
        matches!(self, AudioSource::Media(_))
    }

    /// Short description for logs (never the payload itself)
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Url(url) => format!("url '{}'", url),
            AudioSource::Bytes(bytes) => format!("{} bytes", bytes.len()),
            AudioSource::Media(MediaRef::Selector(sel)) => format!("media selector '{}'", sel),
            AudioSource::Media(MediaRef::Handle(h)) => format!("media handle #{}", h.0),
        }
    }
}

/// Reference to the host surface an engine or overlay draws into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountPoint(pub String);

// =============================================================================
// Regions
// =============================================================================

/// Declarative description of a time region
///
/// Replaced wholesale by the caller, never mutated in place by wavesync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Region id; the key of the enclosing [`RegionMap`] takes precedence
    #[serde(default)]
    pub id: RegionId,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Display attributes passed through to the engine on creation
    #[serde(default, flatten)]
    pub attributes: Attributes,
}

impl RegionDescriptor {
    pub fn new(id: impl Into<RegionId>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            attributes: Attributes::new(),
        }
    }

    /// Add a display attribute (builder style)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the live bounds `start`/`end` differ from this descriptor
    pub fn bounds_differ(&self, start: f64, end: f64) -> bool {
        self.start != start || self.end != end
    }
}

/// Build a [`RegionMap`] keyed by each descriptor's id
pub fn region_map(regions: impl IntoIterator<Item = RegionDescriptor>) -> RegionMap {
    regions.into_iter().map(|r| (r.id.clone(), r)).collect()
}

// =============================================================================
// Event arguments
// =============================================================================

/// A raw argument carried by an engine or region event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventArg {
    Number(f64),
    Flag(bool),
    Text(String),
    Region(RegionId),
}

impl EventArg {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EventArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_region(&self) -> Option<&str> {
        match self {
            EventArg::Region(id) => Some(id),
            _ => None,
        }
    }
}
