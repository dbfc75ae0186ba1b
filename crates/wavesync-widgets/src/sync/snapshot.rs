//! Declarative playback snapshot

use serde::{Deserialize, Serialize};
use wavesync_core::config::EngineOptions;
use wavesync_core::{AudioSource, Peaks, WaveError, WaveResult};

/// Complete desired state of one waveform view
///
/// Replaced wholesale on every update; the synchronizer diffs consecutive
/// snapshots and issues only the engine calls needed to close the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub playing: bool,
    /// Desired playhead in seconds
    pub position: f64,
    /// 0.0 to 1.0; unset leaves the engine's volume alone
    pub volume: Option<f64>,
    /// Pixels per second; unset leaves the engine's zoom alone
    pub zoom: Option<f64>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub source: Option<AudioSource>,
    /// Precomputed peaks, drawn without decoding
    pub peaks: Option<Peaks>,
    /// Redraw on window resize
    pub responsive: bool,
    pub options: EngineOptions,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            playing: false,
            position: 0.0,
            volume: None,
            zoom: None,
            source: None,
            peaks: None,
            responsive: true,
            options: EngineOptions::default(),
        }
    }
}

impl Snapshot {
    pub fn with_source(source: AudioSource) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn playing(mut self, playing: bool) -> Self {
        self.playing = playing;
        self
    }

    pub fn at(mut self, seconds: f64) -> Self {
        self.position = seconds;
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn zoom(mut self, px_per_sec: f64) -> Self {
        self.zoom = Some(px_per_sec);
        self
    }

    pub fn peaks(mut self, peaks: Peaks) -> Self {
        self.peaks = Some(peaks);
        self
    }

    pub fn responsive(mut self, responsive: bool) -> Self {
        self.responsive = responsive;
        self
    }

    /// Reject values no engine call could honour
    pub fn validate(&self) -> WaveResult<()> {
        if !self.position.is_finite() || self.position < 0.0 {
            return Err(WaveError::InvalidOption {
                field: "position",
                reason: format!("expected seconds >= 0, got {}", self.position),
            });
        }
        if let Some(volume) = self.volume {
            if !(0.0..=1.0).contains(&volume) {
                return Err(WaveError::InvalidOption {
                    field: "volume",
                    reason: format!("expected 0.0 to 1.0, got {}", volume),
                });
            }
        }
        if let Some(zoom) = self.zoom {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(WaveError::InvalidOption {
                    field: "zoom",
                    reason: format!("expected pixels per second > 0, got {}", zoom),
                });
            }
        }
        self.options.validate()
    }
}
