//! Playback synchronizer
//!
//! Owns one engine instance and keeps it consistent with the latest
//! [`Snapshot`]. Engine events are queued by the bridges and handled on
//! [`WaveSynchronizer::pump`], which the host calls from its tick:
//!
//! ```text
//! host tick ──► pump(now)
//!                 ├─ drain engine/region/resize events → state + callbacks
//!                 ├─ apply snapshots queued through UpdateHandle
//!                 └─ run the throttled redraw when its window has elapsed
//! ```
//!
//! `update` applies a snapshot immediately; events the engine emits while
//! doing so are handled on the next `pump`.

use std::time::Instant;

use flume::{Receiver, Sender};
use wavesync_core::config::{Backend, EngineConfig, SyncSettings};
use wavesync_core::engine::{EngineEvent, ListenerId, LiveRegion, RegionEvent, WaveEngine};
use wavesync_core::position::{position_to_seconds, seconds_to_position};
use wavesync_core::{
    Attributes, AudioSource, EventArg, LoadError, MediaHandle, MediaRef, Peaks, RegionMap, SharedBytes, WaveError,
    WaveResult,
};

use super::snapshot::Snapshot;
use crate::bridge::{Callbacks, EngineBridge, EventOrigin, EventPayload, QueuedEvent, RegionBridge};
use crate::host::{HostEnvironment, ResizeNotifier};
use crate::overlay::{OverlayContext, OverlayPlugin};
use crate::regions::{ReconcileReport, RegionLayer};
use crate::resize::ResizeThrottle;

/// Lifecycle of a synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mounted; waiting for the first `ready`
    ReadyPending,
    Ready,
    /// A new source is loading; waiting for its `ready`
    Reloading,
    TornDown,
}

/// Queues snapshots from inside callbacks
///
/// Queued snapshots are applied in order on the next `pump`, after the
/// events already waiting.
#[derive(Clone)]
pub struct UpdateHandle {
    sink: Sender<Snapshot>,
}

impl UpdateHandle {
    /// Returns false once the synchronizer is gone
    pub fn request(&self, snapshot: Snapshot) -> bool {
        self.sink.send(snapshot).is_ok()
    }
}

/// A source resolved to the loader call that will be issued
enum LoadRequest {
    Url(String),
    Bytes(SharedBytes),
    Media(MediaHandle),
}

fn resolve_source<H: HostEnvironment>(host: &H, source: &AudioSource) -> Result<LoadRequest, LoadError> {
    match source {
        AudioSource::Url(url) if url.is_empty() => Err(LoadError::EmptySource),
        AudioSource::Url(url) => Ok(LoadRequest::Url(url.clone())),
        AudioSource::Bytes(bytes) if bytes.is_empty() => Err(LoadError::EmptySource),
        AudioSource::Bytes(bytes) => Ok(LoadRequest::Bytes(bytes.clone())),
        AudioSource::Media(MediaRef::Handle(handle)) => Ok(LoadRequest::Media(*handle)),
        AudioSource::Media(MediaRef::Selector(selector)) => {
            host.resolve_media(selector)
                .map(LoadRequest::Media)
                .ok_or_else(|| LoadError::MediaNotFound {
                    selector: selector.clone(),
                })
        }
    }
}

/// Declarative driver for one engine instance
pub struct WaveSynchronizer<E: WaveEngine, H: HostEnvironment> {
    engine: E,
    host: H,
    backend: Backend,
    snapshot: Snapshot,
    phase: Phase,
    is_ready: bool,
    /// Last playhead position reported by the engine, in seconds
    last_known_position: f64,
    /// Position the most recent ready entry seeked to, if it issued a seek
    ready_position: Option<f64>,
    callbacks: Callbacks<E>,

    events_tx: Sender<QueuedEvent>,
    events_rx: Receiver<QueuedEvent>,
    updates_tx: Sender<Snapshot>,
    updates_rx: Receiver<Snapshot>,

    engine_bridge: EngineBridge,
    deferred_seek: Option<ListenerId>,
    regions: RegionLayer<E::Region>,
    overlays: Vec<OverlayPlugin>,
    resize_listener: Option<ListenerId>,
    throttle: ResizeThrottle,
    torn_down: bool,
}

impl<E: WaveEngine, H: HostEnvironment> WaveSynchronizer<E, H> {
    /// Create the engine, subscribe to its events and start loading the source
    ///
    /// A media source forces the media-element backend. Invalid options or a
    /// source that cannot be loaded fail the mount; anything created by then
    /// is released again.
    pub fn mount(host: H, snapshot: Snapshot, callbacks: Callbacks<E>, settings: SyncSettings) -> WaveResult<Self> {
        snapshot.validate()?;

        let mut options = snapshot.options.clone();
        if snapshot.source.as_ref().is_some_and(AudioSource::is_media) {
            options.backend = Backend::MediaElement;
        }
        let request = snapshot
            .source
            .as_ref()
            .map(|source| resolve_source(&host, source))
            .transpose()?;

        let backend = options.backend;
        let mut engine = E::create(EngineConfig {
            options,
            container: host.mount_point(),
        })?;

        let (events_tx, events_rx) = flume::unbounded();
        let (updates_tx, updates_rx) = flume::unbounded();
        let mut engine_bridge = EngineBridge::new(events_tx.clone());
        engine_bridge.attach_all(&mut engine, &EngineEvent::PLAYBACK);
        let regions = RegionLayer::new(RegionBridge::new(events_tx.clone()));

        let mut sync = Self {
            engine,
            host,
            backend,
            snapshot,
            phase: Phase::ReadyPending,
            is_ready: false,
            last_known_position: 0.0,
            ready_position: None,
            callbacks,
            events_tx,
            events_rx,
            updates_tx,
            updates_rx,
            engine_bridge,
            deferred_seek: None,
            regions,
            overlays: Vec::new(),
            resize_listener: None,
            throttle: ResizeThrottle::new(settings.resize_throttle()),
            torn_down: false,
        };

        if let Some(request) = request {
            let peaks = sync.snapshot.peaks.clone();
            sync.issue_load(&request, peaks.as_ref())?;
        }
        if sync.snapshot.responsive {
            sync.attach_resize();
        }
        log::info!(
            "sync: mounted ({})",
            sync.snapshot
                .source
                .as_ref()
                .map(AudioSource::describe)
                .unwrap_or_else(|| "no source".to_string())
        );
        Ok(sync)
    }

    // ─────────────────────────────────────────────────────────────
    // Declarative input
    // ─────────────────────────────────────────────────────────────

    /// Apply a new snapshot
    ///
    /// Issues the minimal set of engine calls that moves the engine from the
    /// previous snapshot to `next`. If the loader call fails nothing else is
    /// applied and the previous snapshot stays current.
    pub fn update(&mut self, next: Snapshot) -> WaveResult<()> {
        if self.torn_down {
            return Err(WaveError::TornDown);
        }
        next.validate()?;
        let was_ready = self.is_ready;

        let source_changed = next.source != self.snapshot.source;
        let peaks_changed = next.peaks != self.snapshot.peaks;
        let mut new_source = false;
        match &next.source {
            Some(source) if source_changed || peaks_changed => {
                let request = resolve_source(&self.host, source)?;
                self.issue_load(&request, next.peaks.as_ref())?;
                if source_changed {
                    log::info!("sync: reloading {}", source.describe());
                    if source.is_media() && self.backend != Backend::MediaElement {
                        log::warn!("sync: media source on a {:?} engine", self.backend);
                    }
                    self.begin_reload();
                    new_source = true;
                } else {
                    log::debug!("sync: peaks changed, reloading {}", source.describe());
                }
            }
            None if source_changed => {
                log::debug!("sync: source cleared, engine keeps the loaded audio");
            }
            _ => {}
        }

        let prev = std::mem::replace(&mut self.snapshot, next);
        let position = self.snapshot.position;
        let playing = self.snapshot.playing;

        if was_ready && position != prev.position && position != self.last_known_position {
            if new_source {
                self.schedule_deferred_seek();
            } else {
                self.seek_seconds(position);
            }
        }

        if was_ready && !new_source && (prev.playing != playing || self.engine.is_playing() != playing) {
            if playing {
                self.engine.play();
            } else {
                self.engine.pause();
            }
        }

        if self.snapshot.volume != prev.volume {
            if let Some(volume) = self.snapshot.volume {
                self.engine.set_volume(volume);
            }
        }

        if self.snapshot.zoom != prev.zoom {
            if let Some(zoom) = self.snapshot.zoom {
                self.engine.zoom(zoom);
            }
        }

        if self.snapshot.options.audio_rate != prev.options.audio_rate {
            self.engine.set_playback_rate(self.snapshot.options.playback_rate());
        }
        let mut compared = prev.options.clone();
        compared.audio_rate = self.snapshot.options.audio_rate;
        if compared != self.snapshot.options {
            log::debug!("sync: engine options changed after mount; only audio_rate is applied live");
        }

        if self.snapshot.responsive != prev.responsive {
            if self.snapshot.responsive {
                self.attach_resize();
            } else {
                self.detach_resize();
            }
        }
        Ok(())
    }

    /// Handle for queueing snapshots from inside callbacks
    pub fn update_handle(&self) -> UpdateHandle {
        UpdateHandle {
            sink: self.updates_tx.clone(),
        }
    }

    /// Set the declarative region mapping
    ///
    /// Applied immediately while ready; otherwise held and applied in full
    /// on the next ready.
    pub fn set_regions(&mut self, regions: RegionMap) -> WaveResult<ReconcileReport> {
        if self.torn_down {
            return Err(WaveError::TornDown);
        }
        Ok(self
            .regions
            .set(&mut self.engine, &mut self.engine_bridge, regions, self.is_ready))
    }

    /// Options for the regions plugin; only effective before it is installed
    pub fn set_region_options(&mut self, options: Attributes) {
        self.regions.set_options(options);
    }

    /// Attach an overlay; it installs now if the engine is ready, else on ready
    pub fn add_overlay(&mut self, mut overlay: OverlayPlugin) -> WaveResult<()> {
        if self.torn_down {
            return Err(WaveError::TornDown);
        }
        overlay.sync(&mut self.engine, self.is_ready);
        self.overlays.push(overlay);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Event processing
    // ─────────────────────────────────────────────────────────────

    /// Process queued events and snapshots, then the throttled redraw
    ///
    /// Returns the number of events and snapshots handled. A queued snapshot
    /// that fails is returned as the error; whatever is still queued stays
    /// for the next call.
    pub fn pump(&mut self, now: Instant) -> WaveResult<usize> {
        if self.torn_down {
            return Ok(0);
        }
        let mut handled = self.drain(now)?;
        if self.throttle.poll(now) {
            self.redraw();
            handled += self.drain(now)?;
        }
        Ok(handled)
    }

    fn drain(&mut self, now: Instant) -> WaveResult<usize> {
        let mut handled = 0;
        loop {
            while let Ok(event) = self.events_rx.try_recv() {
                self.dispatch(event, now);
                handled += 1;
            }
            match self.updates_rx.try_recv() {
                Ok(snapshot) => {
                    self.update(snapshot)?;
                    handled += 1;
                }
                Err(_) => return Ok(handled),
            }
        }
    }

    fn dispatch(&mut self, event: QueuedEvent, now: Instant) {
        match event.origin {
            EventOrigin::Engine(kind) => self.handle_engine_event(kind, &event.args),
            EventOrigin::Region { id, event: kind, generation } => {
                self.handle_region_event(&id, kind, generation, &event.args)
            }
            EventOrigin::DeferredSeek => self.run_deferred_seek(),
            EventOrigin::Resize => {
                if self.resize_listener.is_some() && self.throttle.trigger(now) {
                    log::trace!("sync: redraw scheduled");
                }
            }
        }
    }

    fn handle_engine_event(&mut self, kind: EngineEvent, args: &[EventArg]) {
        let number = args.first().and_then(EventArg::as_number);
        match kind {
            EngineEvent::Ready => self.enter_ready(),
            EngineEvent::Audioprocess => {
                if let Some(seconds) = number {
                    self.last_known_position = seconds;
                    self.callbacks.fire_pos_change(&self.engine, seconds);
                }
            }
            EngineEvent::Seek if self.is_ready => {
                if let Some(position) = number {
                    let seconds = position_to_seconds(position, self.engine.duration());
                    self.last_known_position = seconds;
                    self.callbacks.fire_pos_change(&self.engine, seconds);
                }
            }
            EngineEvent::Error => log::warn!("sync: engine error {:?}", args),
            _ => {}
        }

        // region-removed names a region that is already gone; its id may be live again
        let region = if kind.is_region_event() && kind != EngineEvent::RegionRemoved {
            args.first().and_then(EventArg::as_region).and_then(|id| {
                self.regions
                    .live(id)
                    .cloned()
                    .or_else(|| self.engine.regions().into_iter().find(|r| r.id() == id))
            })
        } else {
            None
        };
        let payload = EventPayload {
            engine: &self.engine,
            region: region.as_ref(),
            args,
        };
        self.callbacks.fire(kind, &payload);
    }

    fn handle_region_event(&mut self, id: &str, kind: RegionEvent, generation: u64, args: &[EventArg]) {
        let region = self.regions.resolve(id, generation).cloned();
        let payload = EventPayload {
            engine: &self.engine,
            region: region.as_ref(),
            args,
        };
        self.callbacks.fire_region(kind, &payload);
        if kind == RegionEvent::Remove {
            self.regions.region_removed(id, generation);
        }
    }

    fn enter_ready(&mut self) {
        self.is_ready = true;
        self.phase = Phase::Ready;
        let position = self.snapshot.position;
        self.last_known_position = position;
        self.ready_position = None;
        log::info!("sync: ready, duration {:.2}s", self.engine.duration());

        if position != 0.0 {
            self.seek_seconds(position);
            self.ready_position = Some(position);
        }
        if let Some(volume) = self.snapshot.volume {
            self.engine.set_volume(volume);
        }
        if self.snapshot.playing {
            self.engine.play();
        }
        if let Some(zoom) = self.snapshot.zoom {
            self.engine.zoom(zoom);
        }
        self.regions.on_ready(&mut self.engine, &mut self.engine_bridge);
        for overlay in &mut self.overlays {
            overlay.sync(&mut self.engine, true);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Engine calls
    // ─────────────────────────────────────────────────────────────

    fn issue_load(&mut self, request: &LoadRequest, peaks: Option<&Peaks>) -> Result<(), LoadError> {
        let result = match request {
            LoadRequest::Url(url) => self.engine.load_url(url, peaks),
            LoadRequest::Bytes(bytes) => self.engine.load_bytes(bytes, peaks),
            LoadRequest::Media(handle) => self.engine.load_media(*handle, peaks),
        };
        if let Err(e) = &result {
            log::warn!("sync: {}", e);
        }
        result
    }

    fn begin_reload(&mut self) {
        self.is_ready = false;
        self.phase = Phase::Reloading;
        self.ready_position = None;
        self.cancel_deferred_seek();
    }

    /// Seek to `seconds`, clamped to the track; ignored while the duration is unknown
    fn seek_seconds(&mut self, seconds: f64) {
        match seconds_to_position(seconds, self.engine.duration()) {
            Ok(position) => {
                let position = position.clamp(0.0, 1.0);
                if self.snapshot.options.auto_center {
                    self.engine.seek_and_center(position);
                } else {
                    self.engine.seek_to(position);
                }
            }
            Err(e) => log::debug!("sync: seek to {:.3}s ignored: {}", seconds, e),
        }
    }

    fn schedule_deferred_seek(&mut self) {
        self.cancel_deferred_seek();
        let id = self
            .engine_bridge
            .attach_as(&mut self.engine, EngineEvent::Ready, EventOrigin::DeferredSeek);
        self.deferred_seek = Some(id);
    }

    fn cancel_deferred_seek(&mut self) {
        if let Some(id) = self.deferred_seek.take() {
            self.engine_bridge.detach(&mut self.engine, id);
        }
    }

    fn run_deferred_seek(&mut self) {
        let Some(id) = self.deferred_seek.take() else {
            return;
        };
        self.engine_bridge.detach(&mut self.engine, id);
        let target = self.snapshot.position;
        if self.ready_position == Some(target) {
            log::trace!("sync: deferred seek already issued on ready");
            return;
        }
        self.seek_seconds(target);
    }

    fn attach_resize(&mut self) {
        if self.resize_listener.is_none() {
            let notifier = ResizeNotifier::new(self.events_tx.clone());
            self.resize_listener = Some(self.host.add_resize_listener(notifier));
        }
    }

    fn detach_resize(&mut self) {
        if let Some(id) = self.resize_listener.take() {
            self.host.remove_resize_listener(id);
        }
        self.throttle.cancel();
    }

    /// Throttled redraw: pause, redraw, restore the declared position, resume
    fn redraw(&mut self) {
        let playing = self.snapshot.playing;
        if playing {
            self.engine.pause();
        }
        self.engine.draw_buffer();
        if self.is_ready {
            self.seek_seconds(self.snapshot.position);
        }
        if playing {
            self.engine.play();
        }
        log::debug!("sync: redrawn after resize");
    }

    // ─────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────

    /// Unsubscribe everything and destroy the engine
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel_deferred_seek();
        self.engine_bridge.detach_all(&mut self.engine);
        self.regions.teardown();
        self.detach_resize();
        self.engine.destroy();
        self.is_ready = false;
        self.phase = Phase::TornDown;

        let dropped = self.events_rx.drain().count() + self.updates_rx.drain().count();
        if dropped > 0 {
            log::debug!("sync: discarded {} queued item(s)", dropped);
        }
        log::info!("sync: torn down");
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn last_known_position(&self) -> f64 {
        self.last_known_position
    }

    /// The region mapping most recently applied to the engine
    pub fn regions(&self) -> &RegionMap {
        self.regions.applied()
    }

    pub fn has_deferred_seek(&self) -> bool {
        self.deferred_seek.is_some()
    }

    pub fn overlay_context(&self) -> OverlayContext<'_, E> {
        OverlayContext {
            engine: &self.engine,
            is_ready: self.is_ready,
        }
    }
}

impl<E: WaveEngine, H: HostEnvironment> Drop for WaveSynchronizer<E, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use wavesync_core::engine::{EngineCall, HeadlessEngine, PluginKind};
    use wavesync_core::{region_map, MountPoint, RegionDescriptor};

    use crate::host::HeadlessHost;

    type Sync = WaveSynchronizer<HeadlessEngine, HeadlessHost>;

    fn url_snapshot(url: &str) -> Snapshot {
        Snapshot::with_source(AudioSource::url(url))
    }

    fn mount_with(snapshot: Snapshot, callbacks: Callbacks<HeadlessEngine>) -> (Sync, HeadlessEngine, HeadlessHost) {
        let _ = env_logger::builder().is_test(true).try_init();
        let host = HeadlessHost::new("wave").with_media("#player", MediaHandle(7));
        let sync = Sync::mount(host.clone(), snapshot, callbacks, SyncSettings::default()).unwrap();
        let engine = sync.engine().clone();
        (sync, engine, host)
    }

    fn mount(snapshot: Snapshot) -> (Sync, HeadlessEngine, HeadlessHost) {
        mount_with(snapshot, Callbacks::new())
    }

    fn ready(sync: &mut Sync, engine: &HeadlessEngine, duration: f64) {
        engine.finish_loading(duration);
        sync.pump(Instant::now()).unwrap();
    }

    fn seeks(calls: &[EngineCall]) -> Vec<f64> {
        calls.iter().filter_map(EngineCall::seek_target).collect()
    }

    #[test]
    fn test_mount_loads_and_subscribes() {
        let (sync, engine, host) = mount(url_snapshot("a.ogg"));
        assert_eq!(
            engine.calls(),
            vec![EngineCall::LoadUrl { url: "a.ogg".to_string(), with_peaks: false }]
        );
        assert_eq!(engine.listener_count(), EngineEvent::PLAYBACK.len());
        assert_eq!(host.resize_listener_count(), 1);
        assert_eq!(sync.phase(), Phase::ReadyPending);
        assert!(!sync.is_ready());
    }

    #[test]
    fn test_media_source_forces_media_element_backend() {
        let (_sync, engine, _host) = mount(Snapshot::with_source(AudioSource::selector("#player")));
        assert_eq!(engine.config().options.backend, Backend::MediaElement);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::LoadMedia { handle: MediaHandle(7), with_peaks: false }]
        );
    }

    #[test]
    fn test_mount_fails_on_unknown_selector() {
        let host = HeadlessHost::new("wave");
        let result = Sync::mount(
            host.clone(),
            Snapshot::with_source(AudioSource::selector("#nope")),
            Callbacks::new(),
            SyncSettings::default(),
        );
        assert!(matches!(
            result,
            Err(WaveError::Load(LoadError::MediaNotFound { .. }))
        ));
        assert_eq!(host.resize_listener_count(), 0);
    }

    #[test]
    fn test_mount_without_source_and_empty_source() {
        let (sync, engine, _host) = mount(Snapshot::default());
        assert!(engine.calls().is_empty());
        assert_eq!(sync.phase(), Phase::ReadyPending);

        let result = Sync::mount(
            HeadlessHost::new("wave"),
            url_snapshot(""),
            Callbacks::new(),
            SyncSettings::default(),
        );
        assert!(matches!(result, Err(WaveError::Load(LoadError::EmptySource))));
    }

    #[test]
    fn test_ready_entry_applies_snapshot() {
        let readies = Rc::new(RefCell::new(0));
        let counter = readies.clone();
        let callbacks = Callbacks::<HeadlessEngine>::new().on(EngineEvent::Ready, move |_| *counter.borrow_mut() += 1);
        let snapshot = url_snapshot("a.ogg").at(30.0).playing(true).volume(0.5).zoom(20.0);
        let (mut sync, engine, _host) = mount_with(snapshot, callbacks);

        sync.set_regions(region_map([RegionDescriptor::new("a", 1.0, 2.0)])).unwrap();
        sync.add_overlay(OverlayPlugin::minimap(Attributes::new())).unwrap();
        engine.take_calls();

        ready(&mut sync, &engine, 120.0);
        assert!(sync.is_ready());
        assert_eq!(sync.phase(), Phase::Ready);
        assert_eq!(
            engine.take_calls(),
            vec![
                EngineCall::SeekTo(0.25),
                EngineCall::SetVolume(0.5),
                EngineCall::Play,
                EngineCall::Zoom(20.0),
                EngineCall::AddPlugin(PluginKind::Regions),
                EngineCall::AddRegion("a".to_string()),
                EngineCall::AddPlugin(PluginKind::Minimap),
            ]
        );
        assert_eq!(*readies.borrow(), 1);
        assert_eq!(sync.last_known_position(), 30.0);
        assert!(sync.overlay_context().is_ready);
    }

    #[test]
    fn test_update_is_idempotent() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 120.0);

        let next = url_snapshot("a.ogg").at(60.0).playing(true).volume(0.8).zoom(40.0);
        sync.update(next.clone()).unwrap();
        sync.pump(Instant::now()).unwrap();
        assert!(!engine.take_calls().is_empty());

        sync.update(next.clone()).unwrap();
        sync.pump(Instant::now()).unwrap();
        assert!(engine.take_calls().is_empty());
    }

    #[test]
    fn test_echoed_position_does_not_seek() {
        let positions = Rc::new(RefCell::new(Vec::new()));
        let log = positions.clone();
        let callbacks = Callbacks::<HeadlessEngine>::new().on_pos_change(move |payload| log.borrow_mut().push(payload.number()));
        let snapshot = url_snapshot("a.ogg").playing(true);
        let (mut sync, engine, _host) = mount_with(snapshot.clone(), callbacks);
        ready(&mut sync, &engine, 120.0);
        engine.take_calls();

        engine.advance(10.0);
        sync.pump(Instant::now()).unwrap();
        assert_eq!(sync.last_known_position(), 10.0);
        assert_eq!(*positions.borrow(), vec![Some(10.0)]);

        // consumer feeds the reported position back
        sync.update(snapshot.clone().at(10.0)).unwrap();
        assert!(engine.take_calls().is_empty());

        sync.update(snapshot.at(90.0)).unwrap();
        assert_eq!(engine.take_calls(), vec![EngineCall::SeekTo(0.75)]);
    }

    #[test]
    fn test_reload_defers_seek_until_ready() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        sync.update(url_snapshot("b.ogg").at(5.0)).unwrap();
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::LoadUrl { url: "b.ogg".to_string(), with_peaks: false }]
        );
        assert!(!sync.is_ready());
        assert_eq!(sync.phase(), Phase::Reloading);
        assert!(sync.has_deferred_seek());

        // nothing seeks before the new track is ready
        sync.pump(Instant::now()).unwrap();
        assert!(engine.take_calls().is_empty());

        ready(&mut sync, &engine, 60.0);
        assert_eq!(seeks(&engine.take_calls()), vec![5.0 / 60.0]);
        assert!(!sync.has_deferred_seek());
        assert_eq!(engine.listener_count(), EngineEvent::PLAYBACK.len());
    }

    #[test]
    fn test_deferred_seek_back_to_start() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg").at(5.0));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        // ready skips the seek to 0.0, so the deferred seek issues it
        sync.update(url_snapshot("b.ogg").at(0.0)).unwrap();
        assert!(sync.has_deferred_seek());
        ready(&mut sync, &engine, 60.0);
        assert_eq!(seeks(&engine.take_calls()), vec![0.0]);
        assert!(!sync.has_deferred_seek());
    }

    #[test]
    fn test_superseding_reload_cancels_deferred_seek() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);

        sync.update(url_snapshot("b.ogg").at(5.0)).unwrap();
        sync.update(url_snapshot("c.ogg").at(5.0)).unwrap();
        assert!(!sync.has_deferred_seek());
        assert_eq!(engine.listener_count(), EngineEvent::PLAYBACK.len());
    }

    #[test]
    fn test_play_pause_waits_for_ready() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        engine.take_calls();

        sync.update(url_snapshot("a.ogg").playing(true).at(12.0)).unwrap();
        assert!(engine.take_calls().is_empty());

        ready(&mut sync, &engine, 120.0);
        assert_eq!(engine.take_calls(), vec![EngineCall::SeekTo(0.1), EngineCall::Play]);

        sync.update(url_snapshot("a.ogg").playing(false).at(12.0)).unwrap();
        assert_eq!(engine.take_calls(), vec![EngineCall::Pause]);
    }

    #[test]
    fn test_engine_drift_is_corrected() {
        let (mut sync, mut engine, _host) = mount(url_snapshot("a.ogg").playing(true));
        ready(&mut sync, &engine, 120.0);

        // engine stopped on its own (e.g. track finished)
        engine.pause();
        engine.take_calls();
        sync.update(url_snapshot("a.ogg").playing(true).volume(0.3)).unwrap();
        assert_eq!(engine.take_calls(), vec![EngineCall::Play, EngineCall::SetVolume(0.3)]);
    }

    #[test]
    fn test_failed_load_keeps_previous_snapshot() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        engine.reject_next_load("unsupported codec");
        let result = sync.update(url_snapshot("b.ogg").volume(0.2));
        assert!(matches!(result, Err(WaveError::Load(LoadError::Rejected { .. }))));
        assert_eq!(sync.snapshot().source, Some(AudioSource::url("a.ogg")));
        assert!(sync.is_ready());
        assert!(engine.take_calls().is_empty());
    }

    #[test]
    fn test_peaks_change_reloads_same_source() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        let peaks = Peaks::from(vec![0.1, 0.5, 0.2]);
        sync.update(url_snapshot("a.ogg").peaks(peaks.clone())).unwrap();
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::LoadUrl { url: "a.ogg".to_string(), with_peaks: true }]
        );

        // same peaks buffer again: no reload
        sync.update(url_snapshot("a.ogg").peaks(peaks)).unwrap();
        assert!(engine.take_calls().iter().all(|call| !call.is_load()));
    }

    #[test]
    fn test_option_changes() {
        let mut snapshot = url_snapshot("a.ogg");
        snapshot.options.auto_center = true;
        let (mut sync, engine, _host) = mount(snapshot.clone());
        ready(&mut sync, &engine, 100.0);
        engine.take_calls();

        let mut faster = snapshot.clone().at(50.0);
        faster.options.audio_rate = Some(1.5);
        sync.update(faster.clone()).unwrap();
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::SeekAndCenter(0.5), EngineCall::SetPlaybackRate(1.5)]
        );

        // unset rate goes back to normal speed
        faster.options.audio_rate = None;
        sync.update(faster).unwrap();
        assert_eq!(engine.take_calls(), vec![EngineCall::SetPlaybackRate(1.0)]);
    }

    #[test]
    fn test_unset_volume_and_zoom_issue_nothing() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg").volume(0.5).zoom(10.0));
        ready(&mut sync, &engine, 100.0);
        engine.take_calls();

        sync.update(url_snapshot("a.ogg")).unwrap();
        assert!(engine.take_calls().is_empty());
    }

    #[test]
    fn test_seek_before_duration_is_ignored() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg").at(5.0));
        // stream with unknown length
        ready(&mut sync, &engine, 0.0);
        assert!(seeks(&engine.take_calls()).is_empty());
        assert!(sync.is_ready());
    }

    #[test]
    fn test_seek_events_only_count_while_ready() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        engine.emit(EngineEvent::Seek, &[EventArg::Number(0.5)]);
        sync.pump(Instant::now()).unwrap();
        assert_eq!(sync.last_known_position(), 0.0);

        ready(&mut sync, &engine, 80.0);
        engine.emit(EngineEvent::Seek, &[EventArg::Number(0.5)]);
        sync.pump(Instant::now()).unwrap();
        assert_eq!(sync.last_known_position(), 40.0);
    }

    #[test]
    fn test_regions_reconcile_only_while_ready() {
        let (mut sync, engine, _host) = mount(url_snapshot("a.ogg"));
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0), RegionDescriptor::new("b", 2.0, 3.0)]);
        let report = sync.set_regions(first.clone()).unwrap();
        assert!(report.is_empty());
        engine.take_calls();

        ready(&mut sync, &engine, 60.0);
        assert_eq!(engine.region_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(sync.regions(), &first);

        let second = region_map([RegionDescriptor::new("a", 0.0, 1.5)]);
        let report = sync.set_regions(second).unwrap();
        assert_eq!(report.updated, vec!["a".to_string()]);
        assert_eq!(report.removed, vec!["b".to_string()]);
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_region_events_reach_callbacks() {
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let (click_log, remove_log) = (clicks.clone(), removed.clone());
        let callbacks = Callbacks::<HeadlessEngine>::new()
            .on_region(RegionEvent::Click, move |payload| {
                click_log.borrow_mut().push(payload.region.map(|r| r.id()));
            })
            .on_slot("onSingleRegionRemove", move |payload| {
                remove_log.borrow_mut().push(payload.region.map(|r| r.id()));
            })
            .unwrap();
        let (mut sync, engine, _host) = mount_with(url_snapshot("a.ogg"), callbacks);
        ready(&mut sync, &engine, 60.0);
        sync.set_regions(region_map([RegionDescriptor::new("a", 0.0, 1.0)])).unwrap();

        engine.emit_region("a", RegionEvent::Click, &[]);
        sync.pump(Instant::now()).unwrap();
        assert_eq!(*clicks.borrow(), vec![Some("a".to_string())]);

        // removed from the engine side (e.g. by the user)
        let live = engine.region("a").unwrap();
        live.remove();
        sync.pump(Instant::now()).unwrap();
        assert_eq!(*removed.borrow(), vec![Some("a".to_string())]);
        assert_eq!(live.listener_count(), 0);
    }

    #[test]
    fn test_region_id_reused_before_pump_keeps_forwarding() {
        let clicks = Rc::new(RefCell::new(0));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let gone = Rc::new(RefCell::new(Vec::new()));
        let (click_log, remove_log, gone_log) = (clicks.clone(), removed.clone(), gone.clone());
        let callbacks = Callbacks::<HeadlessEngine>::new()
            .on(EngineEvent::RegionRemoved, move |payload| {
                gone_log.borrow_mut().push(payload.region.map(|r| r.id()));
            })
            .on_region(RegionEvent::Click, move |_| *click_log.borrow_mut() += 1)
            .on_region(RegionEvent::Remove, move |payload| {
                remove_log.borrow_mut().push(payload.region.map(|r| r.is_removed()));
            });
        let (mut sync, engine, _host) = mount_with(url_snapshot("a.ogg"), callbacks);
        ready(&mut sync, &engine, 60.0);

        let map = region_map([RegionDescriptor::new("a", 0.0, 1.0)]);
        sync.set_regions(map.clone()).unwrap();
        sync.set_regions(RegionMap::new()).unwrap();
        sync.set_regions(map).unwrap();
        sync.pump(Instant::now()).unwrap();

        // the queued remove belongs to the old region
        assert_eq!(*removed.borrow(), vec![Some(true)]);
        assert_eq!(*gone.borrow(), vec![None]);
        assert_eq!(engine.region_listener_count(), 8);

        engine.emit_region("a", RegionEvent::Click, &[]);
        sync.pump(Instant::now()).unwrap();
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn test_resize_burst_redraws_once() {
        let (mut sync, engine, host) = mount(url_snapshot("a.ogg").playing(true));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        let t0 = Instant::now();
        for _ in 0..10 {
            host.resize();
        }
        sync.pump(t0).unwrap();
        assert!(engine.take_calls().is_empty());

        sync.pump(t0 + Duration::from_millis(66)).unwrap();
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::Pause, EngineCall::DrawBuffer, EngineCall::SeekTo(0.0), EngineCall::Play]
        );

        sync.pump(t0 + Duration::from_millis(500)).unwrap();
        assert!(engine.take_calls().is_empty());
    }

    #[test]
    fn test_responsive_toggle() {
        let (mut sync, engine, host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);
        engine.take_calls();

        sync.update(url_snapshot("a.ogg").responsive(false)).unwrap();
        assert_eq!(host.resize_listener_count(), 0);
        assert_eq!(host.resize(), 0);

        sync.update(url_snapshot("a.ogg")).unwrap();
        assert_eq!(host.resize_listener_count(), 1);
    }

    #[test]
    fn test_queued_updates_apply_on_pump() {
        let handle_slot: Rc<RefCell<Option<UpdateHandle>>> = Rc::new(RefCell::new(None));
        let slot = handle_slot.clone();
        let callbacks = Callbacks::<HeadlessEngine>::new().on(EngineEvent::Ready, move |_| {
            if let Some(handle) = slot.borrow().as_ref() {
                handle.request(url_snapshot("a.ogg").volume(0.4));
            }
        });
        let (mut sync, engine, _host) = mount_with(url_snapshot("a.ogg"), callbacks);
        *handle_slot.borrow_mut() = Some(sync.update_handle());
        engine.take_calls();

        ready(&mut sync, &engine, 60.0);
        assert_eq!(engine.take_calls(), vec![EngineCall::SetVolume(0.4)]);
        assert_eq!(sync.snapshot().volume, Some(0.4));
    }

    #[test]
    fn test_teardown_releases_everything() {
        let (mut sync, engine, host) = mount(url_snapshot("a.ogg"));
        ready(&mut sync, &engine, 60.0);
        sync.set_regions(region_map([RegionDescriptor::new("a", 0.0, 1.0)])).unwrap();
        sync.update(url_snapshot("b.ogg").at(5.0)).unwrap();
        assert!(sync.has_deferred_seek());

        sync.teardown();
        assert_eq!(engine.listener_count(), 0);
        assert_eq!(engine.region_listener_count(), 0);
        assert_eq!(host.resize_listener_count(), 0);
        assert!(engine.is_destroyed());
        assert_eq!(sync.phase(), Phase::TornDown);

        // late engine events reach nobody
        engine.finish_loading(60.0);
        assert_eq!(sync.pump(Instant::now()).unwrap(), 0);

        sync.teardown();
        assert!(matches!(sync.update(url_snapshot("c.ogg")), Err(WaveError::TornDown)));
        drop(sync);
        let destroys = engine.calls().iter().filter(|c| **c == EngineCall::Destroy).count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn test_no_callbacks_after_teardown() {
        let fired = Rc::new(RefCell::new(0));
        let mut callbacks = Callbacks::<HeadlessEngine>::new();
        for event in EngineEvent::PLAYBACK {
            let counter = fired.clone();
            callbacks = callbacks.on(event, move |_| *counter.borrow_mut() += 1);
        }
        let (mut sync, engine, _host) = mount_with(url_snapshot("a.ogg"), callbacks);
        sync.teardown();

        for event in EngineEvent::PLAYBACK {
            engine.emit(event, &[EventArg::Number(0.5)]);
        }
        sync.pump(Instant::now()).unwrap();
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn test_drop_tears_down() {
        let (sync, engine, host) = mount(url_snapshot("a.ogg"));
        drop(sync);
        assert!(engine.is_destroyed());
        assert_eq!(engine.listener_count(), 0);
        assert_eq!(host.resize_listener_count(), 0);
    }

    #[test]
    fn test_mount_point_comes_from_host() {
        let (_sync, engine, _host) = mount(url_snapshot("a.ogg"));
        assert_eq!(engine.config().container, MountPoint("wave".to_string()));
    }
}
