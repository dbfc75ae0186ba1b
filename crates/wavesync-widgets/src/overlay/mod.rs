//! Overlay plugins (timeline, minimap)
//!
//! Overlays are children of a synchronizer. They install their engine plugin
//! once, on the first sync that sees a ready engine; a sync before that is a
//! no-op and the synchronizer retries on its next ready.

use wavesync_core::engine::{PluginKind, PluginSpec, WaveEngine};
use wavesync_core::{Attributes, MountPoint};

/// What an overlay sees of its parent synchronizer
pub struct OverlayContext<'a, E: WaveEngine> {
    pub engine: &'a E,
    pub is_ready: bool,
}

/// A declarative overlay that installs one engine plugin
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlugin {
    kind: PluginKind,
    options: Attributes,
    container: Option<MountPoint>,
    installed: bool,
}

impl OverlayPlugin {
    /// Time ruler drawn into its own surface
    pub fn timeline(container: MountPoint, options: Attributes) -> Self {
        Self {
            kind: PluginKind::Timeline,
            options,
            container: Some(container),
            installed: false,
        }
    }

    /// Scaled-down overview of the whole waveform
    pub fn minimap(options: Attributes) -> Self {
        Self {
            kind: PluginKind::Minimap,
            options,
            container: None,
            installed: false,
        }
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Install the plugin if the engine is ready and it is not installed yet
    ///
    /// Returns true when this call installed it.
    pub fn sync<E: WaveEngine>(&mut self, engine: &mut E, is_ready: bool) -> bool {
        if self.installed || !is_ready {
            return false;
        }
        engine.add_plugin(PluginSpec {
            kind: self.kind,
            options: self.options.clone(),
            container: self.container.clone(),
        });
        self.installed = true;
        log::info!("overlay: {} installed", self.kind.name());
        true
    }
}
