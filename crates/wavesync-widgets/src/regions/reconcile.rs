//! Minimal-diff reconciliation of a declarative region map against live regions

use std::borrow::Cow;
use std::collections::HashMap;

use wavesync_core::engine::{LiveRegion, WaveEngine};
use wavesync_core::{RegionDescriptor, RegionId, RegionMap};

use crate::bridge::RegionBridge;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub created: Vec<RegionId>,
    pub updated: Vec<RegionId>,
    pub removed: Vec<RegionId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Number of engine mutations issued
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.removed.len()
    }
}

/// Bring the engine's live regions in line with `next`
///
/// Ids in `next` without a live region are created and wired; live regions
/// whose bounds differ are updated in place; live regions whose id is not
/// in `next` are removed. `previous` is the mapping applied last time and
/// is only used to spot attribute-only changes, which are not applied.
/// Removed regions are unwired before this returns.
pub fn reconcile<E: WaveEngine>(
    engine: &mut E,
    previous: &RegionMap,
    next: &RegionMap,
    bridge: &mut RegionBridge<E::Region>,
) -> ReconcileReport {
    let mut unaccounted: HashMap<RegionId, E::Region> =
        engine.regions().into_iter().map(|region| (region.id(), region)).collect();
    let mut report = ReconcileReport::default();

    for (id, descriptor) in next {
        match unaccounted.remove(id) {
            None => {
                // the map key wins over a stale or missing descriptor id
                let descriptor = if descriptor.id == *id {
                    Cow::Borrowed(descriptor)
                } else {
                    Cow::Owned(RegionDescriptor {
                        id: id.clone(),
                        ..descriptor.clone()
                    })
                };
                let live = engine.add_region(&descriptor);
                bridge.wire(&live);
                report.created.push(id.clone());
            }
            Some(live) => {
                if descriptor.bounds_differ(live.start(), live.end()) {
                    live.update(descriptor.start, descriptor.end);
                    report.updated.push(id.clone());
                } else if previous
                    .get(id)
                    .is_some_and(|applied| applied.attributes != descriptor.attributes)
                {
                    log::debug!(
                        "regions: '{}' changed attributes only; give it a new id to apply them",
                        id
                    );
                }
            }
        }
    }

    let mut leftovers: Vec<(RegionId, E::Region)> = unaccounted.into_iter().collect();
    leftovers.sort_by(|a, b| a.0.cmp(&b.0));
    for (id, live) in leftovers {
        // remove first so the region's own remove event is forwarded
        live.remove();
        bridge.retire(&id);
        report.removed.push(id);
    }

    if !report.is_empty() {
        log::debug!(
            "regions: {} created, {} updated, {} removed",
            report.created.len(),
            report.updated.len(),
            report.removed.len()
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavesync_core::config::{EngineConfig, EngineOptions};
    use wavesync_core::engine::{EngineCall, HeadlessEngine};
    use wavesync_core::{region_map, MountPoint};

    fn setup() -> (HeadlessEngine, RegionBridge<wavesync_core::engine::HeadlessRegion>) {
        let engine = HeadlessEngine::new(EngineConfig {
            options: EngineOptions::default(),
            container: MountPoint("wave".to_string()),
        });
        let (tx, _rx) = flume::unbounded();
        // receiver dropped: forwarded events are discarded, wiring still counts
        (engine, RegionBridge::new(tx))
    }

    #[test]
    fn test_creates_from_empty() {
        let (mut engine, mut bridge) = setup();
        let next = region_map([RegionDescriptor::new("a", 0.0, 1.0), RegionDescriptor::new("b", 2.0, 3.0)]);

        let report = reconcile(&mut engine, &RegionMap::new(), &next, &mut bridge);
        assert_eq!(report.created, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(engine.region_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(bridge.is_wired("a") && bridge.is_wired("b"));
    }

    #[test]
    fn test_minimal_diff() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([
            RegionDescriptor::new("a", 0.0, 1.0),
            RegionDescriptor::new("b", 2.0, 3.0),
            RegionDescriptor::new("c", 4.0, 5.0),
        ]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);
        engine.take_calls();

        // a unchanged, b moved, c dropped, d new
        let second = region_map([
            RegionDescriptor::new("a", 0.0, 1.0),
            RegionDescriptor::new("b", 2.5, 3.5),
            RegionDescriptor::new("d", 6.0, 7.0),
        ]);
        let report = reconcile(&mut engine, &first, &second, &mut bridge);

        assert_eq!(report.created, vec!["d".to_string()]);
        assert_eq!(report.updated, vec!["b".to_string()]);
        assert_eq!(report.removed, vec!["c".to_string()]);
        assert_eq!(
            engine.take_calls(),
            vec![
                EngineCall::UpdateRegion { id: "b".to_string(), start: 2.5, end: 3.5 },
                EngineCall::AddRegion("d".to_string()),
                EngineCall::RemoveRegion("c".to_string()),
            ]
        );

        // applying the same map again issues nothing
        let report = reconcile(&mut engine, &second, &second, &mut bridge);
        assert!(report.is_empty());
        assert!(engine.take_calls().is_empty());
    }

    #[test]
    fn test_replace_one_region() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0), RegionDescriptor::new("b", 2.0, 3.0)]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);

        let second = region_map([RegionDescriptor::new("a", 0.0, 1.0), RegionDescriptor::new("c", 4.0, 5.0)]);
        let report = reconcile(&mut engine, &first, &second, &mut bridge);
        assert_eq!(report.created, vec!["c".to_string()]);
        assert_eq!(report.removed, vec!["b".to_string()]);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn test_update_only_on_numeric_change() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0)]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);
        engine.take_calls();

        let same = region_map([RegionDescriptor::new("a", 0.0, 1.0)]);
        assert!(reconcile(&mut engine, &first, &same, &mut bridge).is_empty());

        let wider = region_map([RegionDescriptor::new("a", 0.0, 1.2)]);
        let report = reconcile(&mut engine, &same, &wider, &mut bridge);
        assert_eq!(report.updated, vec!["a".to_string()]);
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::UpdateRegion { id: "a".to_string(), start: 0.0, end: 1.2 }]
        );
    }

    #[test]
    fn test_attribute_only_change_is_not_applied() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0).with_attribute("color", "red")]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);

        let second = region_map([RegionDescriptor::new("a", 0.0, 1.0).with_attribute("color", "blue")]);
        let report = reconcile(&mut engine, &first, &second, &mut bridge);
        assert!(report.is_empty());
        let live = engine.region("a").unwrap();
        assert_eq!(live.attributes().get("color"), Some(&serde_yaml::Value::from("red")));
    }

    #[test]
    fn test_map_key_overrides_descriptor_id() {
        let (mut engine, mut bridge) = setup();
        let mut next = RegionMap::new();
        next.insert("intro".to_string(), RegionDescriptor::new("", 0.0, 4.0));

        let report = reconcile(&mut engine, &RegionMap::new(), &next, &mut bridge);
        assert_eq!(report.created, vec!["intro".to_string()]);
        assert_eq!(engine.region_ids(), vec!["intro".to_string()]);
    }

    #[test]
    fn test_empty_map_removes_everything() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0), RegionDescriptor::new("b", 1.0, 2.0)]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);

        let report = reconcile(&mut engine, &first, &RegionMap::new(), &mut bridge);
        assert_eq!(report.removed.len(), 2);
        assert!(engine.region_ids().is_empty());
        assert!(bridge.is_empty());
        assert_eq!(bridge.retired_count(), 2);
    }

    #[test]
    fn test_removed_region_is_unwired_before_reuse() {
        let (mut engine, mut bridge) = setup();
        let first = region_map([RegionDescriptor::new("a", 0.0, 1.0)]);
        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);
        let old = engine.region("a").unwrap();

        reconcile(&mut engine, &first, &RegionMap::new(), &mut bridge);
        assert!(!bridge.is_wired("a"));
        assert_eq!(old.listener_count(), 0);

        reconcile(&mut engine, &RegionMap::new(), &first, &mut bridge);
        assert!(bridge.is_wired("a"));
        assert_eq!(engine.region_listener_count(), 8);
    }
}
