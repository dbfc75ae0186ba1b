//! Regions overlay state held by the synchronizer

use wavesync_core::engine::{EngineEvent, LiveRegion, PluginKind, PluginSpec, WaveEngine};
use wavesync_core::{Attributes, RegionMap};

use super::reconcile::{reconcile, ReconcileReport};
use crate::bridge::{EngineBridge, RegionBridge};

/// Tracks the declarative region mapping and the live regions it produced
///
/// The regions plugin is installed on the first mapping applied while the
/// engine is ready. Mappings set before that are held back and applied in
/// full on the next ready.
pub struct RegionLayer<R: LiveRegion> {
    options: Attributes,
    installed: bool,
    applied: RegionMap,
    pending: Option<RegionMap>,
    bridge: RegionBridge<R>,
}

impl<R: LiveRegion> RegionLayer<R> {
    pub fn new(bridge: RegionBridge<R>) -> Self {
        Self {
            options: Attributes::new(),
            installed: false,
            applied: RegionMap::new(),
            pending: None,
            bridge,
        }
    }

    /// Options forwarded to the regions plugin when it is installed
    pub fn set_options(&mut self, options: Attributes) {
        if self.installed {
            log::debug!("regions: plugin already installed, options ignored");
        }
        self.options = options;
    }

    /// Set the declarative mapping
    pub fn set<E>(&mut self, engine: &mut E, events: &mut EngineBridge, next: RegionMap, is_ready: bool) -> ReconcileReport
    where
        E: WaveEngine<Region = R>,
    {
        if !is_ready {
            log::debug!("regions: engine not ready, holding {} region(s)", next.len());
            self.pending = Some(next);
            return ReconcileReport::default();
        }
        self.apply(engine, events, next)
    }

    /// Apply a held-back mapping once the engine reports ready
    pub fn on_ready<E>(&mut self, engine: &mut E, events: &mut EngineBridge) -> ReconcileReport
    where
        E: WaveEngine<Region = R>,
    {
        match self.pending.take() {
            Some(next) => self.apply(engine, events, next),
            None => ReconcileReport::default(),
        }
    }

    fn apply<E>(&mut self, engine: &mut E, events: &mut EngineBridge, next: RegionMap) -> ReconcileReport
    where
        E: WaveEngine<Region = R>,
    {
        self.pending = None;
        self.install(engine, events);
        let report = reconcile(engine, &self.applied, &next, &mut self.bridge);
        self.applied = next;
        report
    }

    fn install<E>(&mut self, engine: &mut E, events: &mut EngineBridge)
    where
        E: WaveEngine<Region = R>,
    {
        if self.installed {
            return;
        }
        engine.add_plugin(PluginSpec {
            kind: PluginKind::Regions,
            options: self.options.clone(),
            container: None,
        });
        events.attach_all(engine, &EngineEvent::REGIONS);
        self.installed = true;
        log::info!("regions: plugin installed");
    }

    /// A live region reported its own removal
    ///
    /// Only the wiring that forwarded the event is dropped; a region that
    /// has since reused the id keeps its handlers.
    pub fn region_removed(&mut self, id: &str, generation: u64) {
        self.bridge.release(id, generation);
    }

    /// Live region handle for `id`, if this layer wired it
    pub fn live(&self, id: &str) -> Option<&R> {
        self.bridge.get(id)
    }

    /// Region that forwarded an event from wiring `generation`
    pub fn resolve(&self, id: &str, generation: u64) -> Option<&R> {
        self.bridge.resolve(id, generation)
    }

    /// The mapping most recently applied to the engine
    pub fn applied(&self) -> &RegionMap {
        &self.applied
    }

    pub fn pending(&self) -> Option<&RegionMap> {
        self.pending.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn wired_count(&self) -> usize {
        self.bridge.len()
    }

    /// Remove every per-region handler
    pub fn teardown(&mut self) {
        self.bridge.unwire_all();
        self.pending = None;
    }
}
