//! Configuration for wavesync
//!
//! - [`EngineOptions`]: options forwarded to the engine adapter on creation
//! - [`SyncSettings`]: tuning for the reconciliation layer itself
//! - Generic YAML loading/saving for both, and the default config location
//!
//! # Usage
//!
//! ```ignore
//! use wavesync_core::config::{load_config, default_config_path, EngineOptions};
//!
//! let options: EngineOptions = load_config(&default_config_path("engine.yaml"));
//! options.validate()?;
//! ```

mod io;
mod options;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use options::{Backend, EngineConfig, EngineOptions, SyncSettings, DEFAULT_RESIZE_THROTTLE_MS};
pub use paths::{default_config_dir, default_config_path};
