//! Engine options and synchronizer settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{WaveError, WaveResult};
use crate::types::MountPoint;

/// Default resize throttle window in milliseconds (sub-frame, ~15 Hz)
pub const DEFAULT_RESIZE_THROTTLE_MS: u64 = 66;

/// Audio backend the engine should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Decode into memory and play through the engine's own graph
    #[default]
    WebAudio,
    /// Play through an external media element (required for media-handle sources)
    MediaElement,
}

/// Options forwarded to the engine adapter when it is created
///
/// Unset optional values leave the engine's own default in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Playback rate (1.0 = normal speed)
    pub audio_rate: Option<f64>,
    /// Keep the cursor centered when seeking
    pub auto_center: bool,
    pub backend: Backend,
    /// Width of waveform bars in pixels; unset draws a continuous waveform
    pub bar_width: Option<f64>,
    pub cursor_color: Option<String>,
    pub cursor_width: Option<u32>,
    /// Allow creating regions by dragging on the waveform
    pub drag_selection: bool,
    pub fill_parent: bool,
    pub height: Option<u32>,
    pub hide_scrollbar: bool,
    /// Whether pointer interaction (click to seek) is enabled
    pub interact: bool,
    pub loop_selection: bool,
    pub media_controls: bool,
    pub min_px_per_sec: Option<u32>,
    pub normalize: bool,
    pub pixel_ratio: Option<f64>,
    pub progress_color: Option<String>,
    pub scroll_parent: bool,
    /// Seconds skipped by the engine's skip forward/backward
    pub skip_length: Option<f64>,
    pub wave_color: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            audio_rate: None,
            auto_center: false,
            backend: Backend::WebAudio,
            bar_width: None,
            cursor_color: None,
            cursor_width: None,
            drag_selection: false,
            fill_parent: true,
            height: None,
            hide_scrollbar: false,
            interact: true,
            loop_selection: true,
            media_controls: false,
            min_px_per_sec: None,
            normalize: false,
            pixel_ratio: None,
            progress_color: None,
            scroll_parent: false,
            skip_length: None,
            wave_color: None,
        }
    }
}

impl EngineOptions {
    /// Check values the engine cannot accept
    ///
    /// Integer options are non-negative by type; real-valued options must be
    /// finite and strictly positive when set.
    pub fn validate(&self) -> WaveResult<()> {
        check_positive("audio_rate", self.audio_rate)?;
        check_positive("bar_width", self.bar_width)?;
        check_positive("pixel_ratio", self.pixel_ratio)?;
        check_positive("skip_length", self.skip_length)?;
        Ok(())
    }

    /// Playback rate to apply (unset means normal speed)
    pub fn playback_rate(&self) -> f64 {
        self.audio_rate.unwrap_or(1.0)
    }
}

fn check_positive(field: &'static str, value: Option<f64>) -> WaveResult<()> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(WaveError::InvalidOption {
            field,
            reason: format!("expected a positive number, got {}", v),
        }),
        _ => Ok(()),
    }
}

/// Everything an engine adapter receives at construction
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub options: EngineOptions,
    /// Where the waveform is drawn
    pub container: MountPoint,
}

/// Tuning for the reconciliation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Resize notifications are coalesced into one redraw per window
    pub resize_throttle_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            resize_throttle_ms: DEFAULT_RESIZE_THROTTLE_MS,
        }
    }
}

impl SyncSettings {
    pub fn resize_throttle(&self) -> Duration {
        Duration::from_millis(self.resize_throttle_ms)
    }
}
