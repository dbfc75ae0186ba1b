//! Seconds ↔ normalized position conversion
//!
//! Engines address the playhead as a fraction of the track (0.0 to 1.0);
//! the declarative layer speaks seconds. Duration is only known once the
//! engine reports ready, so the seconds → position direction can fail.

use crate::error::{WaveError, WaveResult};

/// Convert seconds to a normalized position for a track of `duration` seconds
///
/// Returns [`WaveError::NoDuration`] when the duration is zero, negative or
/// not a finite number. The result is not clamped.
pub fn seconds_to_position(seconds: f64, duration: f64) -> WaveResult<f64> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(WaveError::NoDuration);
    }
    Ok(seconds / duration)
}

/// Convert a normalized position to seconds for a track of `duration` seconds
pub fn position_to_seconds(position: f64, duration: f64) -> f64 {
    position * duration
}
