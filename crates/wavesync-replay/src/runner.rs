//! Scenario execution over the headless engine and host

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use wavesync_core::config::SyncSettings;
use wavesync_core::engine::{EngineCall, EngineEvent, HeadlessEngine, LiveRegion, RegionEvent};
use wavesync_core::{region_map, MediaHandle, WaveResult};
use wavesync_widgets::{Callbacks, HeadlessHost, WaveSynchronizer};

use crate::scenario::{Scenario, Step};

type Synchronizer = WaveSynchronizer<HeadlessEngine, HeadlessHost>;

/// What one step did
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    pub label: String,
    /// Engine calls issued while running the step and the pump after it
    pub calls: Vec<EngineCall>,
    /// Callback slots that fired, in order
    pub fired: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Engine calls issued by mount
    pub mount_calls: Vec<EngineCall>,
    pub steps: Vec<StepOutcome>,
}

impl Report {
    pub fn errors(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Callbacks that record the slot name of every event they see
fn recording_callbacks(fired: Rc<RefCell<Vec<String>>>) -> Callbacks<HeadlessEngine> {
    let mut callbacks = Callbacks::<HeadlessEngine>::new();
    for event in EngineEvent::PLAYBACK.iter().chain(EngineEvent::REGIONS.iter()) {
        let log = fired.clone();
        let slot = event.slot_name();
        callbacks = callbacks.on(*event, move |_| log.borrow_mut().push(slot.clone()));
    }
    for event in RegionEvent::ALL {
        let log = fired.clone();
        let slot = event.slot_name();
        callbacks = callbacks.on_region(event, move |payload| {
            let id = payload.region.map(|r| r.id()).unwrap_or_default();
            log.borrow_mut().push(format!("{}({})", slot, id));
        });
    }
    let log = fired;
    callbacks.on_pos_change(move |payload| {
        log.borrow_mut()
            .push(format!("onPosChange({:.3})", payload.number().unwrap_or_default()));
    })
}

/// Mount the scenario and run every step
///
/// Step failures are recorded in the report; with `strict` the run stops
/// at the first one. Only a failed mount is returned as an error.
pub fn run(scenario: &Scenario, settings: SyncSettings, strict: bool) -> WaveResult<Report> {
    let host = scenario
        .media
        .iter()
        .fold(HeadlessHost::new(scenario.mount.clone()), |host, (selector, handle)| {
            host.with_media(selector.clone(), MediaHandle(*handle))
        });
    let fired = Rc::new(RefCell::new(Vec::new()));

    let mut sync = Synchronizer::mount(
        host.clone(),
        scenario.initial.clone(),
        recording_callbacks(fired.clone()),
        settings,
    )?;
    let engine = sync.engine().clone();
    let mut now = Instant::now();

    let mut report = Report {
        mount_calls: engine.take_calls(),
        steps: Vec::new(),
    };

    for (index, step) in scenario.steps.iter().enumerate() {
        let label = step.label();
        log::debug!("replay: step {} {}", index, label);

        let mut result = run_step(&mut sync, &engine, &host, step, &mut now);
        if result.is_ok() {
            result = sync.pump(now).map(|_| ());
        }
        let error = result.err().map(|e| e.to_string());
        if let Some(e) = &error {
            log::warn!("replay: step {} ({}) failed: {}", index, label, e);
        }

        report.steps.push(StepOutcome {
            index,
            label,
            calls: engine.take_calls(),
            fired: std::mem::take(&mut *fired.borrow_mut()),
            error: error.clone(),
        });
        if strict && error.is_some() {
            break;
        }
    }
    Ok(report)
}

fn run_step(
    sync: &mut Synchronizer,
    engine: &HeadlessEngine,
    host: &HeadlessHost,
    step: &Step,
    now: &mut Instant,
) -> WaveResult<()> {
    match step {
        Step::Update(snapshot) => sync.update(snapshot.clone())?,
        Step::Regions(regions) => {
            let report = sync.set_regions(region_map(regions.iter().cloned()))?;
            log::debug!("replay: {} region mutation(s)", report.total());
        }
        Step::FinishLoading(duration) => engine.finish_loading(*duration),
        Step::RejectNextLoad(reason) => engine.reject_next_load(reason.clone()),
        Step::Advance(seconds) => engine.advance(*seconds),
        Step::Emit { event, args } => engine.emit(*event, args),
        Step::EmitRegion { id, event, args } => {
            if !engine.emit_region(id, *event, args) {
                log::warn!("replay: no live region '{}'", id);
            }
        }
        Step::Resize(count) => {
            for _ in 0..*count {
                host.resize();
            }
        }
        Step::WaitMs(ms) => *now += Duration::from_millis(*ms),
        Step::Teardown => sync.teardown(),
    }
    Ok(())
}
