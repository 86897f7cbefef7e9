// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Unattended resolution of every device group to its best sensor.

use crate::grouping::GroupMap;
use crate::selection::{Bucket, SelectionState};
use fluxion_dedup_types::{SensorRecord, SourceType};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoSelection {
    /// Number of device groups resolved
    pub count: usize,
    /// Winning sensor of each group, in group order
    pub chosen: Vec<SensorRecord>,
}

/// Key used to partition the pool: device id, then duplicate group, then the
/// sensor's own entity id.
pub fn device_key(sensor: &SensorRecord) -> &str {
    sensor
        .device_id
        .as_deref()
        .or(sensor.duplicate_group.as_deref())
        .unwrap_or(&sensor.entity_id)
}

/// Device key qualified by measurement type; power and energy readings of one
/// device are resolved independently.
fn partition_key(sensor: &SensorRecord) -> String {
    format!("{}|{}", device_key(sensor), sensor.measurement_type().as_str())
}

/// Rank members by score, highest first. Stable, so ties keep pool order.
pub fn rank(members: &mut [&SensorRecord]) {
    members.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
}

/// Disjoint-set over partition keys.
#[derive(Debug, Default)]
struct KeyMerger {
    parent: HashMap<String, String>,
}

impl KeyMerger {
    fn find(&self, key: &str) -> String {
        let mut current = key;
        while let Some(next) = self.parent.get(current) {
            current = next.as_str();
        }
        current.to_owned()
    }

    fn union(&mut self, a: &str, b: &str) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent.insert(root_b, root_a);
        }
    }
}

/// Merge partitions whose same-type sensors share a duplicate group, so one
/// physical reading exposed under several device ids resolves to one winner.
fn merge_duplicates(state: &SelectionState, groups: &GroupMap) -> KeyMerger {
    let mut merger = KeyMerger::default();
    for group in groups.values() {
        let mut first_by_type: HashMap<SourceType, String> = HashMap::new();
        for member in &group.members {
            let Some(sensor) = state.get(&member.entity_id) else {
                continue;
            };
            let key = partition_key(sensor);
            match first_by_type.entry(sensor.measurement_type()) {
                Entry::Occupied(first) => merger.union(first.get(), &key),
                Entry::Vacant(slot) => {
                    slot.insert(key);
                }
            }
        }
    }
    merger
}

/// Winner and loser ids of every device group, in first-appearance order.
fn plan(state: &SelectionState, groups: &GroupMap) -> Vec<(SensorRecord, Vec<String>)> {
    let merger = merge_duplicates(state, groups);
    let mut order: Vec<String> = Vec::new();
    let mut partitions: HashMap<String, Vec<&SensorRecord>> = HashMap::new();
    for sensor in state.pool() {
        let key = merger.find(&partition_key(sensor));
        partitions
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(sensor);
    }

    order
        .iter()
        .filter_map(|key| partitions.remove(key))
        .filter_map(|mut members| {
            rank(&mut members);
            let (winner, losers) = members.split_first()?;
            let losers = losers.iter().map(|s| s.entity_id.clone()).collect();
            Some((SensorRecord::clone(winner), losers))
        })
        .collect()
}

/// Activate the top-ranked sensor of every device group and deactivate the rest.
///
/// Bypasses the conflict detector; this pass is itself the authority for the
/// groups it touches. Does not persist anything.
pub fn auto_select_best(state: &mut SelectionState, groups: &GroupMap) -> AutoSelection {
    let plan = plan(state, groups);
    if plan.is_empty() {
        return AutoSelection::default();
    }

    let mut selection = AutoSelection::default();
    for (mut winner, losers) in plan {
        if state.move_to(&winner.entity_id, Bucket::Selected) == Some(true) {
            debug!("[AUTO-SELECT] Activated {}", winner.entity_id);
        }
        for loser in &losers {
            state.move_to(loser, Bucket::Alternative);
        }
        winner.selected = true;
        selection.count += 1;
        selection.chosen.push(winner);
    }

    info!(
        "✅ [AUTO-SELECT] Resolved {} device group(s)",
        selection.count
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{self, EnergyFilter};
    use crate::ignore::IgnoreSet;
    use fluxion_dedup_types::IntegrationId;

    fn scored(entity_id: &str, group: Option<&str>, score: u32) -> SensorRecord {
        SensorRecord {
            duplicate_group: group.map(str::to_owned),
            quality_score: score,
            ..SensorRecord::new(entity_id, IntegrationId::parse("shelly").unwrap())
        }
    }

    #[test]
    fn test_empty_pool_is_noop() {
        let mut state = SelectionState::default();
        let result = auto_select_best(&mut state, &GroupMap::new());
        assert_eq!(result, AutoSelection::default());
    }

    #[test]
    fn test_best_member_wins_and_others_deactivate() {
        let mut state = SelectionState::default();
        state.insert(scored("sensor.low", Some("g1"), 80), Bucket::Selected);
        state.insert(scored("sensor.high", Some("g1"), 120), Bucket::Alternative);

        let result = auto_select_best(&mut state, &GroupMap::new());
        assert_eq!(result.count, 1);
        assert_eq!(result.chosen[0].entity_id, "sensor.high");
        assert!(state.is_selected("sensor.high"));
        assert!(!state.is_selected("sensor.low"));
    }

    #[test]
    fn test_tie_keeps_pool_order() {
        let mut state = SelectionState::default();
        state.insert(scored("sensor.first", Some("g1"), 100), Bucket::Alternative);
        state.insert(scored("sensor.second", Some("g1"), 100), Bucket::Alternative);

        for _ in 0..3 {
            let result = auto_select_best(&mut state, &GroupMap::new());
            assert_eq!(result.chosen[0].entity_id, "sensor.first");
        }
        assert!(!state.is_selected("sensor.second"));
    }

    #[test]
    fn test_device_id_takes_precedence_over_group() {
        let mut a = scored("sensor.a", Some("g1"), 100);
        a.device_id = Some("dev1".to_owned());
        let mut b = scored("sensor.b", Some("g2"), 90);
        b.device_id = Some("dev1".to_owned());
        let lonely = scored("sensor.c", None, 10);

        let mut state = SelectionState::default();
        state.insert(a, Bucket::Alternative);
        state.insert(b, Bucket::Selected);
        state.insert(lonely, Bucket::Alternative);

        let result = auto_select_best(&mut state, &GroupMap::new());
        assert_eq!(result.count, 2);
        assert!(state.is_selected("sensor.a"));
        assert!(!state.is_selected("sensor.b"));
        assert!(state.is_selected("sensor.c"));
    }

    fn metered(entity_id: &str, device: &str, group: &str, unit: &str, score: u32) -> SensorRecord {
        SensorRecord {
            device_id: Some(device.to_owned()),
            unit: unit.to_owned(),
            ..scored(entity_id, Some(group), score)
        }
    }

    fn grouped(state: &SelectionState) -> GroupMap {
        grouping::group(state.pool(), &IgnoreSet::default(), &EnergyFilter::default())
    }

    #[test]
    fn test_shared_group_merges_distinct_devices() {
        let mut state = SelectionState::default();
        state.insert(
            metered("sensor.plug_shelly", "dev-shelly", "plug", "W", 100),
            Bucket::Selected,
        );
        state.insert(
            metered("sensor.plug_tplink", "dev-tplink", "plug", "W", 90),
            Bucket::Selected,
        );
        let groups = grouped(&state);

        let result = auto_select_best(&mut state, &groups);
        assert_eq!(result.count, 1);
        assert!(state.is_selected("sensor.plug_shelly"));
        assert!(!state.is_selected("sensor.plug_tplink"));
    }

    #[test]
    fn test_power_and_energy_of_one_device_both_kept() {
        let mut state = SelectionState::default();
        state.insert(metered("sensor.plug_power", "dev1", "plug", "W", 60), Bucket::Alternative);
        state.insert(metered("sensor.plug_energy", "dev1", "plug", "kWh", 110), Bucket::Alternative);
        let groups = grouped(&state);

        let result = auto_select_best(&mut state, &groups);
        assert_eq!(result.count, 2);
        assert!(state.is_selected("sensor.plug_power"));
        assert!(state.is_selected("sensor.plug_energy"));
    }
}
