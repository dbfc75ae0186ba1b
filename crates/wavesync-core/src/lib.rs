//! Wavesync Core - engine capabilities shared by the reconciliation layer
//!
//! The waveform engine itself (decode, playback, pixel rendering) is an
//! external collaborator. This crate describes the surface wavesync drives:
//!
//! - **types**: audio sources, peaks, region descriptors, raw event arguments
//! - **engine**: the [`engine::WaveEngine`] / [`engine::LiveRegion`] traits, event
//!   name tables, and an in-memory [`engine::HeadlessEngine`]
//! - **position**: seconds ↔ normalized position conversion
//! - **config**: engine options and YAML config I/O
//! - **error**: the error taxonomy shared by every crate in the workspace

pub mod config;
pub mod engine;
pub mod error;
pub mod position;
pub mod types;

pub use error::{LoadError, WaveError, WaveResult};
pub use types::*;
