//! Default locations for wavesync configuration files

use std::path::PathBuf;

/// Directory holding wavesync configuration
///
/// Returns: `<platform config dir>/wavesync`, or `./wavesync` when the
/// platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wavesync")
}

/// Default path of a config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
