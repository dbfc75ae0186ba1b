//! Error types for wavesync
//!
//! Configuration and usage errors are raised synchronously and abort the
//! operation that triggered them. Errors reported by the engine at runtime
//! are not represented here: they arrive as `error` events and are forwarded
//! to the consumer's callback verbatim.

use thiserror::Error;

/// Errors raised while selecting or issuing a loader call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The audio source carries no payload (empty url or zero-length bytes)
    #[error("Audio source is empty: expected a url, audio bytes or a media handle")]
    EmptySource,

    /// A media selector did not resolve to anything in the host environment
    #[error("Media element not found for selector '{selector}'")]
    MediaNotFound { selector: String },

    /// The engine refused the load call
    #[error("Engine rejected load: {reason}")]
    Rejected { reason: String },
}

/// Errors that can occur while driving an engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaveError {
    /// Loading an audio source failed
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    /// A seek was requested before the engine knows the track duration
    #[error("Track duration is unknown")]
    NoDuration,

    /// An engine option has a value the engine cannot accept
    #[error("Invalid option '{field}': {reason}")]
    InvalidOption { field: &'static str, reason: String },

    /// The engine adapter could not be constructed
    #[error("Failed to create engine: {0}")]
    EngineCreate(String),

    /// A callback was registered under a slot name no event maps to
    #[error("Unknown callback slot '{0}'")]
    UnknownCallbackSlot(String),

    /// The engine has already been destroyed
    #[error("Engine has been torn down")]
    TornDown,
}

/// Result type for wavesync operations
pub type WaveResult<T> = Result<T, WaveError>;
