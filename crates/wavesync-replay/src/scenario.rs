//! Scenario files
//!
//! A scenario mounts one synchronizer over the headless engine and host,
//! then runs a list of steps against it:
//!
//! ```yaml
//! mount: waveform
//! media:
//!   "#player": 7
//! initial:
//!   source:
//!     url: track.ogg
//! steps:
//!   - finish_loading: 120.0
//!   - update:
//!       source:
//!         url: track.ogg
//!       playing: true
//!   - advance: 2.5
//!   - resize: 4
//!   - wait_ms: 70
//!   - teardown
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wavesync_core::config::{read_config, SyncSettings};
use wavesync_core::engine::{EngineEvent, RegionEvent};
use wavesync_core::{EventArg, RegionDescriptor};
use wavesync_widgets::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Mount point reported by the headless host
    #[serde(default = "default_mount")]
    pub mount: String,
    /// Media selectors the host can resolve
    #[serde(default)]
    pub media: BTreeMap<String, u64>,
    /// Overrides the settings file when present
    #[serde(default)]
    pub settings: Option<SyncSettings>,
    #[serde(default)]
    pub initial: Snapshot,
    /// Steps are single-key maps (`finish_loading: 120.0`) or bare names (`teardown`)
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

fn default_mount() -> String {
    "waveform".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Apply a new snapshot
    Update(Snapshot),
    /// Replace the region mapping
    Regions(Vec<RegionDescriptor>),
    /// Complete the pending load with this duration in seconds
    FinishLoading(f64),
    /// Make the next load call fail
    RejectNextLoad(String),
    /// Play forward this many seconds (only while playing)
    Advance(f64),
    Emit {
        event: EngineEvent,
        #[serde(default)]
        args: Vec<EventArg>,
    },
    EmitRegion {
        id: String,
        event: RegionEvent,
        #[serde(default)]
        args: Vec<EventArg>,
    },
    /// Fire this many window resizes
    Resize(u32),
    /// Move the virtual clock forward
    WaitMs(u64),
    Teardown,
}

impl Step {
    /// Short label for reports
    pub fn label(&self) -> String {
        match self {
            Step::Update(snapshot) => format!(
                "update (playing={}, position={}{})",
                snapshot.playing,
                snapshot.position,
                snapshot
                    .source
                    .as_ref()
                    .map(|s| format!(", {}", s.describe()))
                    .unwrap_or_default()
            ),
            Step::Regions(regions) => format!("regions ({})", regions.len()),
            Step::FinishLoading(duration) => format!("finish_loading {}s", duration),
            Step::RejectNextLoad(reason) => format!("reject_next_load '{}'", reason),
            Step::Advance(seconds) => format!("advance {}s", seconds),
            Step::Emit { event, .. } => format!("emit {}", event.name()),
            Step::EmitRegion { id, event, .. } => format!("emit {} on '{}'", event.name(), id),
            Step::Resize(count) => format!("resize x{}", count),
            Step::WaitMs(ms) => format!("wait {}ms", ms),
            Step::Teardown => "teardown".to_string(),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let scenario: Scenario = read_config(path)?;
        scenario
            .initial
            .validate()
            .with_context(|| format!("Invalid initial snapshot in {:?}", path))?;
        Ok(scenario)
    }
}
