//! Event bridge between engine emitters and declarative callbacks
//!
//! Engine handlers never touch synchronizer state directly. Each handler
//! wraps the raw arguments in a [`QueuedEvent`] and pushes it into a flume
//! channel; the synchronizer drains the channel on `pump`, updates its own
//! state and then invokes the consumer's callbacks with an [`EventPayload`].
//!
//! ```text
//! engine.on(..) handler → flume channel → WaveSynchronizer::pump() → Callbacks
//! ```
//!
//! Every subscription made through a bridge is remembered so teardown can
//! remove all of them before the engine is destroyed.

use std::collections::HashMap;

use flume::Sender;
use wavesync_core::engine::{EngineEvent, ListenerId, LiveRegion, RegionEvent, WaveEngine};
use wavesync_core::{EventArg, RegionId, WaveError, WaveResult};

/// Where a queued event came from
#[derive(Debug, Clone, PartialEq)]
pub enum EventOrigin {
    /// Engine-level event
    Engine(EngineEvent),
    /// Event emitted by one live region
    ///
    /// `generation` identifies the wiring that forwarded it, so an event
    /// queued by a removed region is never attributed to a newer region
    /// that reuses its id.
    Region {
        id: RegionId,
        event: RegionEvent,
        generation: u64,
    },
    /// One-shot `ready` subscription that restores the position after a reload
    DeferredSeek,
    /// Host resize notification
    Resize,
}

/// An event waiting to be processed by the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub origin: EventOrigin,
    pub args: Vec<EventArg>,
}

impl QueuedEvent {
    pub fn new(origin: EventOrigin, args: &[EventArg]) -> Self {
        Self {
            origin,
            args: args.to_vec(),
        }
    }
}

/// What a declarative callback receives
pub struct EventPayload<'a, E: WaveEngine> {
    /// The engine that emitted the event (or owns the emitting region)
    pub engine: &'a E,
    /// The region the event concerns, if any
    pub region: Option<&'a E::Region>,
    /// Raw event arguments, unmodified
    pub args: &'a [EventArg],
}

impl<'a, E: WaveEngine> EventPayload<'a, E> {
    /// First argument as a number (position, progress, zoom level)
    pub fn number(&self) -> Option<f64> {
        self.args.first().and_then(EventArg::as_number)
    }
}

/// A declarative callback slot
pub type Callback<E> = Box<dyn FnMut(&EventPayload<'_, E>)>;

/// Declarative callback slots, keyed by event
///
/// Slots can be registered by event or by their conventional name
/// (`onReady`, `onRegionClick`, `onSingleRegionUpdate`, ...).
pub struct Callbacks<E: WaveEngine> {
    engine: HashMap<EngineEvent, Callback<E>>,
    region: HashMap<RegionEvent, Callback<E>>,
    pos_change: Option<Callback<E>>,
}

impl<E: WaveEngine> Default for Callbacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: WaveEngine> Callbacks<E> {
    pub fn new() -> Self {
        Self {
            engine: HashMap::new(),
            region: HashMap::new(),
            pos_change: None,
        }
    }

    /// Register the callback for an engine-level event
    pub fn on(mut self, event: EngineEvent, callback: impl FnMut(&EventPayload<'_, E>) + 'static) -> Self {
        self.engine.insert(event, Box::new(callback));
        self
    }

    /// Register the callback for a per-region event
    pub fn on_region(mut self, event: RegionEvent, callback: impl FnMut(&EventPayload<'_, E>) + 'static) -> Self {
        self.region.insert(event, Box::new(callback));
        self
    }

    /// Register the position callback
    ///
    /// Receives the playback position in seconds as its only argument, from
    /// `audioprocess` and (converted from the normalized position) from `seek`.
    pub fn on_pos_change(mut self, callback: impl FnMut(&EventPayload<'_, E>) + 'static) -> Self {
        self.pos_change = Some(Box::new(callback));
        self
    }

    /// Register a callback by slot name
    pub fn on_slot(self, slot: &str, callback: impl FnMut(&EventPayload<'_, E>) + 'static) -> WaveResult<Self> {
        if slot == "onPosChange" {
            return Ok(self.on_pos_change(callback));
        }
        if let Some(event) = EngineEvent::PLAYBACK
            .iter()
            .chain(EngineEvent::REGIONS.iter())
            .find(|event| event.slot_name() == slot)
        {
            return Ok(self.on(*event, callback));
        }
        if let Some(event) = RegionEvent::ALL.iter().find(|event| event.slot_name() == slot) {
            return Ok(self.on_region(*event, callback));
        }
        Err(WaveError::UnknownCallbackSlot(slot.to_string()))
    }

    pub fn has(&self, event: EngineEvent) -> bool {
        self.engine.contains_key(&event)
    }

    pub(crate) fn fire(&mut self, event: EngineEvent, payload: &EventPayload<'_, E>) {
        if let Some(callback) = self.engine.get_mut(&event) {
            callback(payload);
        }
    }

    pub(crate) fn fire_region(&mut self, event: RegionEvent, payload: &EventPayload<'_, E>) {
        if let Some(callback) = self.region.get_mut(&event) {
            callback(payload);
        }
    }

    pub(crate) fn fire_pos_change(&mut self, engine: &E, seconds: f64) {
        if let Some(callback) = self.pos_change.as_mut() {
            let args = [EventArg::Number(seconds)];
            callback(&EventPayload {
                engine,
                region: None,
                args: &args,
            });
        }
    }
}

// =============================================================================
// Engine-level bridge
// =============================================================================

/// Tracks engine-level subscriptions that forward into the event queue
pub struct EngineBridge {
    sink: Sender<QueuedEvent>,
    listeners: Vec<(EngineEvent, ListenerId)>,
}

impl EngineBridge {
    pub fn new(sink: Sender<QueuedEvent>) -> Self {
        Self {
            sink,
            listeners: Vec::new(),
        }
    }

    /// Forward `event` into the queue, tagged with `origin`
    pub fn attach_as<E: WaveEngine>(&mut self, engine: &mut E, event: EngineEvent, origin: EventOrigin) -> ListenerId {
        let sink = self.sink.clone();
        let id = engine.on(
            event,
            Box::new(move |args: &[EventArg]| {
                if sink.send(QueuedEvent::new(origin.clone(), args)).is_err() {
                    log::trace!("bridge: queue closed, dropping {:?}", origin);
                }
            }),
        );
        self.listeners.push((event, id));
        id
    }

    /// Forward `event` into the queue as an engine event
    pub fn attach<E: WaveEngine>(&mut self, engine: &mut E, event: EngineEvent) -> ListenerId {
        self.attach_as(engine, event, EventOrigin::Engine(event))
    }

    pub fn attach_all<E: WaveEngine>(&mut self, engine: &mut E, events: &[EngineEvent]) {
        for event in events {
            self.attach(engine, *event);
        }
    }

    /// Remove one subscription made through this bridge
    pub fn detach<E: WaveEngine>(&mut self, engine: &mut E, id: ListenerId) -> bool {
        match self.listeners.iter().position(|(_, listener)| *listener == id) {
            Some(index) => {
                self.listeners.swap_remove(index);
                engine.un_listener(id);
                true
            }
            None => false,
        }
    }

    /// Remove every subscription made through this bridge
    pub fn detach_all<E: WaveEngine>(&mut self, engine: &mut E) {
        for (event, id) in self.listeners.drain(..) {
            log::trace!("bridge: unsubscribing {}", event.name());
            engine.un_listener(id);
        }
    }

    pub fn is_attached(&self, event: EngineEvent) -> bool {
        self.listeners.iter().any(|(attached, _)| *attached == event)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

// =============================================================================
// Per-region bridge
// =============================================================================

/// Tracks live regions whose events forward into the event queue
///
/// Each wiring gets a fresh generation. A region retired by the reconciler
/// keeps its handle until its queued `remove` event has been handled.
pub struct RegionBridge<R: LiveRegion> {
    sink: Sender<QueuedEvent>,
    wired: HashMap<RegionId, (u64, R)>,
    retired: HashMap<u64, R>,
    next_generation: u64,
}

impl<R: LiveRegion> RegionBridge<R> {
    pub fn new(sink: Sender<QueuedEvent>) -> Self {
        Self {
            sink,
            wired: HashMap::new(),
            retired: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Forward every region-level event of `region` into the queue
    ///
    /// Returns the generation its events are tagged with.
    pub fn wire(&mut self, region: &R) -> u64 {
        let id = region.id();
        if self.wired.contains_key(&id) {
            // Engine reused an id we still hold handlers for
            self.unwire(&id);
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        for event in RegionEvent::ALL {
            let sink = self.sink.clone();
            let origin = EventOrigin::Region {
                id: id.clone(),
                event,
                generation,
            };
            region.on(
                event,
                Box::new(move |args: &[EventArg]| {
                    let _ = sink.send(QueuedEvent::new(origin.clone(), args));
                }),
            );
        }
        self.wired.insert(id, (generation, region.clone()));
        generation
    }

    /// Remove every handler this bridge registered on region `id`
    pub fn unwire(&mut self, id: &str) -> bool {
        match self.wired.remove(id) {
            Some((_, region)) => {
                unsubscribe(&region);
                log::trace!("bridge: unwired region '{}'", id);
                true
            }
            None => false,
        }
    }

    /// Unwire region `id` after the engine removed it
    ///
    /// Call after `remove()` so the region's own `remove` event is already
    /// queued. The handle stays resolvable under its generation until
    /// [`RegionBridge::release`] is called for that event.
    pub fn retire(&mut self, id: &str) -> Option<u64> {
        let (generation, region) = self.wired.remove(id)?;
        unsubscribe(&region);
        self.retired.insert(generation, region);
        log::trace!("bridge: retired region '{}' (generation {})", id, generation);
        Some(generation)
    }

    /// The region that forwarded an event tagged `(id, generation)`
    pub fn resolve(&self, id: &str, generation: u64) -> Option<&R> {
        match self.wired.get(id) {
            Some((current, region)) if *current == generation => Some(region),
            _ => self.retired.get(&generation),
        }
    }

    /// Forget the wiring `(id, generation)` after its `remove` event
    ///
    /// A newer wiring of the same id is left untouched. Returns whether
    /// anything was released.
    pub fn release(&mut self, id: &str, generation: u64) -> bool {
        if self.retired.remove(&generation).is_some() {
            return true;
        }
        if self.generation(id) == Some(generation) {
            return self.unwire(id);
        }
        log::debug!(
            "bridge: stale remove for region '{}' (generation {}) ignored",
            id,
            generation
        );
        false
    }

    pub fn unwire_all(&mut self) {
        let ids: Vec<RegionId> = self.wired.keys().cloned().collect();
        for id in ids {
            self.unwire(&id);
        }
        self.retired.clear();
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.wired.get(id).map(|(_, region)| region)
    }

    /// Generation of the current wiring of region `id`
    pub fn generation(&self, id: &str) -> Option<u64> {
        self.wired.get(id).map(|(generation, _)| *generation)
    }

    pub fn is_wired(&self, id: &str) -> bool {
        self.wired.contains_key(id)
    }

    /// Retired regions whose `remove` event has not been handled yet
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn len(&self) -> usize {
        self.wired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wired.is_empty()
    }
}

fn unsubscribe<R: LiveRegion>(region: &R) {
    for event in RegionEvent::ALL {
        region.un(event);
    }
}
