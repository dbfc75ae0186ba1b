//! In-memory engine adapter
//!
//! `HeadlessEngine` implements [`WaveEngine`] without decoding or drawing
//! anything. It records every imperative call, tracks the playback state a
//! real engine would report, and emits the same events a real engine emits
//! for those calls (`play`, `pause`, `seek`, `zoom`, region `update`/`remove`).
//!
//! Loading never completes by itself: call [`HeadlessEngine::finish_loading`]
//! to emit `ready` with a duration. The engine is a cheap shared handle, so a
//! clone kept outside the owner can inspect calls and inject events.
//!
//! Handlers must not register or remove listeners on the emitting object
//! while it is dispatching.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::adapter::{EventHandler, ListenerId, LiveRegion, PluginKind, PluginSpec, WaveEngine};
use super::events::{EngineEvent, RegionEvent};
use crate::config::EngineConfig;
use crate::error::{LoadError, WaveResult};
use crate::types::{Attributes, EventArg, MediaHandle, Peaks, RegionDescriptor, RegionId, SharedBytes};

/// One recorded imperative call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    LoadUrl { url: String, with_peaks: bool },
    LoadBytes { len: usize, with_peaks: bool },
    LoadMedia { handle: MediaHandle, with_peaks: bool },
    Play,
    Pause,
    SeekTo(f64),
    SeekAndCenter(f64),
    SetVolume(f64),
    Zoom(f64),
    SetPlaybackRate(f64),
    DrawBuffer,
    Destroy,
    AddPlugin(PluginKind),
    AddRegion(RegionId),
    UpdateRegion { id: RegionId, start: f64, end: f64 },
    RemoveRegion(RegionId),
}

impl EngineCall {
    pub fn is_load(&self) -> bool {
        matches!(
            self,
            EngineCall::LoadUrl { .. } | EngineCall::LoadBytes { .. } | EngineCall::LoadMedia { .. }
        )
    }

    /// Normalized target of a seek call
    pub fn seek_target(&self) -> Option<f64> {
        match self {
            EngineCall::SeekTo(p) | EngineCall::SeekAndCenter(p) => Some(*p),
            _ => None,
        }
    }
}

type Listeners<K> = Vec<(ListenerId, K, EventHandler)>;

struct EngineState {
    config: EngineConfig,
    calls: Vec<EngineCall>,
    listeners: Listeners<EngineEvent>,
    regions: Vec<HeadlessRegion>,
    plugins: Vec<PluginSpec>,
    next_listener: u64,
    duration: f64,
    position: f64,
    playing: bool,
    destroyed: bool,
    rejected_load: Option<String>,
}

impl EngineState {
    fn allocate_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }
}

/// Invoke every handler registered for `event`
fn dispatch<K: Copy + PartialEq>(listeners: &mut Listeners<K>, event: K, args: &[EventArg]) {
    for (_, kind, handler) in listeners.iter_mut() {
        if *kind == event {
            handler(args);
        }
    }
}

fn emit_engine(state: &Rc<RefCell<EngineState>>, event: EngineEvent, args: &[EventArg]) {
    let mut listeners = std::mem::take(&mut state.borrow_mut().listeners);
    dispatch(&mut listeners, event, args);
    let mut state = state.borrow_mut();
    listeners.append(&mut state.listeners);
    state.listeners = listeners;
}

/// In-memory [`WaveEngine`]
#[derive(Clone)]
pub struct HeadlessEngine {
    state: Rc<RefCell<EngineState>>,
}

impl HeadlessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState {
                config,
                calls: Vec::new(),
                listeners: Vec::new(),
                regions: Vec::new(),
                plugins: Vec::new(),
                next_listener: 0,
                duration: 0.0,
                position: 0.0,
                playing: false,
                destroyed: false,
                rejected_load: None,
            })),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────

    /// Configuration the engine was created with
    pub fn config(&self) -> EngineConfig {
        self.state.borrow().config.clone()
    }

    /// Every call recorded so far
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.borrow().calls.clone()
    }

    /// Drain the recorded calls
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    /// Number of engine-level handlers currently registered
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Number of handlers registered across all live regions
    pub fn region_listener_count(&self) -> usize {
        self.state
            .borrow()
            .regions
            .iter()
            .map(|r| r.state.borrow().listeners.len())
            .sum()
    }

    pub fn plugins(&self) -> Vec<PluginKind> {
        self.state.borrow().plugins.iter().map(|p| p.kind).collect()
    }

    pub fn region(&self, id: &str) -> Option<HeadlessRegion> {
        self.state.borrow().regions.iter().find(|r| r.id() == id).cloned()
    }

    /// Ids of live regions in creation order
    pub fn region_ids(&self) -> Vec<RegionId> {
        self.state.borrow().regions.iter().map(|r| r.id()).collect()
    }

    /// Normalized playhead position
    pub fn position(&self) -> f64 {
        self.state.borrow().position
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    // ─────────────────────────────────────────────────────────────
    // Driving
    // ─────────────────────────────────────────────────────────────

    /// Complete the pending load: set the duration and emit `ready`
    pub fn finish_loading(&self, duration: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.duration = duration;
            state.position = 0.0;
        }
        emit_engine(&self.state, EngineEvent::Ready, &[]);
    }

    /// Make the next load call fail with [`LoadError::Rejected`]
    pub fn reject_next_load(&self, reason: impl Into<String>) {
        self.state.borrow_mut().rejected_load = Some(reason.into());
    }

    /// Advance playback by `seconds`, emitting `audioprocess` with the new time
    pub fn advance(&self, seconds: f64) {
        let time = {
            let mut state = self.state.borrow_mut();
            if !state.playing || state.duration <= 0.0 {
                return;
            }
            let time = (state.position * state.duration + seconds).min(state.duration);
            state.position = time / state.duration;
            time
        };
        emit_engine(&self.state, EngineEvent::Audioprocess, &[EventArg::Number(time)]);
    }

    /// Emit an arbitrary engine event
    pub fn emit(&self, event: EngineEvent, args: &[EventArg]) {
        emit_engine(&self.state, event, args);
    }

    /// Emit an event on a live region; returns false if no such region exists
    pub fn emit_region(&self, id: &str, event: RegionEvent, args: &[EventArg]) -> bool {
        match self.region(id) {
            Some(region) => {
                region.emit(event, args);
                true
            }
            None => false,
        }
    }

    fn record(&self, call: EngineCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn begin_load(&self, call: EngineCall) -> Result<(), LoadError> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.rejected_load.take() {
            return Err(LoadError::Rejected { reason });
        }
        state.calls.push(call);
        state.duration = 0.0;
        state.position = 0.0;
        state.playing = false;
        Ok(())
    }
}

impl WaveEngine for HeadlessEngine {
    type Region = HeadlessRegion;

    fn create(config: EngineConfig) -> WaveResult<Self> {
        log::debug!("headless: created in {:?}", config.container);
        Ok(Self::new(config))
    }

    fn load_url(&mut self, url: &str, peaks: Option<&Peaks>) -> Result<(), LoadError> {
        self.begin_load(EngineCall::LoadUrl {
            url: url.to_string(),
            with_peaks: peaks.is_some(),
        })
    }

    fn load_bytes(&mut self, bytes: &SharedBytes, peaks: Option<&Peaks>) -> Result<(), LoadError> {
        self.begin_load(EngineCall::LoadBytes {
            len: bytes.len(),
            with_peaks: peaks.is_some(),
        })
    }

    fn load_media(&mut self, media: MediaHandle, peaks: Option<&Peaks>) -> Result<(), LoadError> {
        self.begin_load(EngineCall::LoadMedia {
            handle: media,
            with_peaks: peaks.is_some(),
        })
    }

    fn play(&mut self) {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(EngineCall::Play);
            state.playing = true;
        }
        emit_engine(&self.state, EngineEvent::Play, &[]);
    }

    fn pause(&mut self) {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(EngineCall::Pause);
            state.playing = false;
        }
        emit_engine(&self.state, EngineEvent::Pause, &[]);
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn seek_to(&mut self, position: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(EngineCall::SeekTo(position));
            state.position = position;
        }
        emit_engine(&self.state, EngineEvent::Seek, &[EventArg::Number(position)]);
    }

    fn seek_and_center(&mut self, position: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(EngineCall::SeekAndCenter(position));
            state.position = position;
        }
        emit_engine(&self.state, EngineEvent::Seek, &[EventArg::Number(position)]);
    }

    fn set_volume(&mut self, volume: f64) {
        self.record(EngineCall::SetVolume(volume));
    }

    fn zoom(&mut self, px_per_sec: f64) {
        self.record(EngineCall::Zoom(px_per_sec));
        emit_engine(&self.state, EngineEvent::Zoom, &[EventArg::Number(px_per_sec)]);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.record(EngineCall::SetPlaybackRate(rate));
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn draw_buffer(&mut self) {
        self.record(EngineCall::DrawBuffer);
    }

    fn destroy(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(EngineCall::Destroy);
        state.destroyed = true;
        state.playing = false;
    }

    fn on(&mut self, event: EngineEvent, handler: EventHandler) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_listener();
        state.listeners.push((id, event, handler));
        id
    }

    fn un(&mut self, event: EngineEvent) {
        self.state.borrow_mut().listeners.retain(|(_, kind, _)| *kind != event);
    }

    fn un_listener(&mut self, id: ListenerId) {
        self.state.borrow_mut().listeners.retain(|(listener, _, _)| *listener != id);
    }

    fn add_plugin(&mut self, plugin: PluginSpec) {
        let mut state = self.state.borrow_mut();
        state.calls.push(EngineCall::AddPlugin(plugin.kind));
        state.plugins.push(plugin);
    }

    fn add_region(&mut self, region: &RegionDescriptor) -> HeadlessRegion {
        let live = HeadlessRegion {
            state: Rc::new(RefCell::new(RegionState {
                id: region.id.clone(),
                start: region.start,
                end: region.end,
                attributes: region.attributes.clone(),
                listeners: Vec::new(),
                removed: false,
            })),
            engine: Rc::downgrade(&self.state),
        };
        let mut state = self.state.borrow_mut();
        state.calls.push(EngineCall::AddRegion(region.id.clone()));
        state.regions.push(live.clone());
        live
    }

    fn regions(&self) -> Vec<HeadlessRegion> {
        self.state.borrow().regions.clone()
    }
}

// =============================================================================
// Regions
// =============================================================================

struct RegionState {
    id: RegionId,
    start: f64,
    end: f64,
    attributes: Attributes,
    listeners: Listeners<RegionEvent>,
    removed: bool,
}

/// Live region of a [`HeadlessEngine`]
#[derive(Clone)]
pub struct HeadlessRegion {
    state: Rc<RefCell<RegionState>>,
    engine: Weak<RefCell<EngineState>>,
}

impl HeadlessRegion {
    pub fn attributes(&self) -> Attributes {
        self.state.borrow().attributes.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn is_removed(&self) -> bool {
        self.state.borrow().removed
    }

    /// Emit an event on this region
    pub fn emit(&self, event: RegionEvent, args: &[EventArg]) {
        let mut listeners = std::mem::take(&mut self.state.borrow_mut().listeners);
        dispatch(&mut listeners, event, args);
        let mut state = self.state.borrow_mut();
        listeners.append(&mut state.listeners);
        state.listeners = listeners;
    }

    fn engine_event(&self, call: EngineCall, event: EngineEvent) {
        if let Some(engine) = self.engine.upgrade() {
            engine.borrow_mut().calls.push(call);
            emit_engine(&engine, event, &[EventArg::Region(self.id())]);
        }
    }
}

impl LiveRegion for HeadlessRegion {
    fn id(&self) -> RegionId {
        self.state.borrow().id.clone()
    }

    fn start(&self) -> f64 {
        self.state.borrow().start
    }

    fn end(&self) -> f64 {
        self.state.borrow().end
    }

    fn update(&self, start: f64, end: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.start = start;
            state.end = end;
        }
        self.emit(RegionEvent::Update, &[]);
        self.engine_event(
            EngineCall::UpdateRegion {
                id: self.id(),
                start,
                end,
            },
            EngineEvent::RegionUpdated,
        );
    }

    fn remove(&self) {
        if self.is_removed() {
            return;
        }
        self.emit(RegionEvent::Remove, &[]);
        self.state.borrow_mut().removed = true;
        if let Some(engine) = self.engine.upgrade() {
            engine
                .borrow_mut()
                .regions
                .retain(|r| !Rc::ptr_eq(&r.state, &self.state));
        }
        self.engine_event(EngineCall::RemoveRegion(self.id()), EngineEvent::RegionRemoved);
    }

    fn on(&self, event: RegionEvent, handler: EventHandler) -> ListenerId {
        let id = match self.engine.upgrade() {
            Some(engine) => engine.borrow_mut().allocate_listener(),
            None => ListenerId(0),
        };
        self.state.borrow_mut().listeners.push((id, event, handler));
        id
    }

    fn un(&self, event: RegionEvent) {
        self.state.borrow_mut().listeners.retain(|(_, kind, _)| *kind != event);
    }
}
