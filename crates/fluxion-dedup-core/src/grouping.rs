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

//! Duplicate group detection.
//!
//! Sensors arrive pre-annotated with a `duplicate_group` signature (device name,
//! area and measurement type). A signature only becomes a group once at least
//! two active sensors share it.

use crate::ignore::IgnoreSet;
use fluxion_dedup_types::{
    DuplicateGroup, EngineConfig, GroupKind, GroupMember, SensorRecord, SourceType,
};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Duplicate groups keyed by signature.
pub type GroupMap = BTreeMap<String, DuplicateGroup>;

/// Energy relevance check: namespace prefix plus device class or unit allow-list.
#[derive(Debug, Clone)]
pub struct EnergyFilter {
    prefixes: Vec<String>,
    device_classes: Vec<String>,
    units: Vec<String>,
}

impl EnergyFilter {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            prefixes: config.entity_prefixes.clone(),
            device_classes: config
                .allowed_device_classes
                .iter()
                .map(|c| c.trim().to_lowercase())
                .collect(),
            units: config.allowed_units.clone(),
        }
    }

    pub fn is_relevant(&self, sensor: &SensorRecord) -> bool {
        let in_namespace = self
            .prefixes
            .iter()
            .any(|prefix| sensor.entity_id.starts_with(prefix.as_str()));
        if !in_namespace {
            return false;
        }

        let class_ok = sensor.source_type != SourceType::Unknown
            && self
                .device_classes
                .iter()
                .any(|c| c == sensor.source_type.as_str());
        let unit_ok = self.units.iter().any(|u| u == sensor.unit.trim());

        class_ok || unit_ok
    }
}

impl Default for EnergyFilter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Partition the catalog into duplicate groups.
///
/// Ignored, reference and irrelevant sensors are dropped first, ids are
/// deduplicated (first occurrence wins) and only signatures with two or more
/// remaining members are emitted.
pub fn group<'a>(
    sensors: impl IntoIterator<Item = &'a SensorRecord>,
    ignore: &IgnoreSet,
    filter: &EnergyFilter,
) -> GroupMap {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut candidates: BTreeMap<&str, Vec<&SensorRecord>> = BTreeMap::new();

    for sensor in sensors {
        if sensor.entity_id.is_empty() || !seen.insert(sensor.entity_id.as_str()) {
            continue;
        }
        if sensor.is_reference || ignore.contains(&sensor.entity_id) || !filter.is_relevant(sensor)
        {
            continue;
        }
        let Some(signature) = sensor.group_signature() else {
            continue;
        };
        candidates.entry(signature).or_default().push(sensor);
    }

    let groups: GroupMap = candidates
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(signature, members)| {
            let group = build_group(signature, &members);
            (signature.to_owned(), group)
        })
        .collect();

    debug!(
        "🔗 [GROUPING] {} duplicate group(s) from {} distinct sensor(s)",
        groups.len(),
        seen.len()
    );
    groups
}

fn build_group(signature: &str, members: &[&SensorRecord]) -> DuplicateGroup {
    let name = members
        .iter()
        .find_map(|m| m.device_name.clone())
        .unwrap_or_else(|| signature.to_owned());
    let area = members.iter().find_map(|m| m.area.clone());

    DuplicateGroup {
        signature: signature.to_owned(),
        name,
        area,
        members: members
            .iter()
            .map(|m| GroupMember {
                entity_id: m.entity_id.clone(),
                integration: m.integration.clone(),
                friendly_name: m.friendly_name.clone(),
            })
            .collect(),
    }
}

/// Split groups into (multi-integration, intra-integration).
pub fn partition_by_kind(groups: &GroupMap) -> (Vec<&DuplicateGroup>, Vec<&DuplicateGroup>) {
    groups
        .values()
        .partition(|g| g.kind() == GroupKind::MultiIntegration)
}

/// Refresh `is_duplicate` / `duplicate_tag` on every record.
pub fn annotate<'a>(sensors: impl IntoIterator<Item = &'a mut SensorRecord>, groups: &GroupMap) {
    for sensor in sensors {
        let kind = sensor
            .group_signature()
            .and_then(|sig| groups.get(sig))
            .filter(|g| g.contains(&sensor.entity_id))
            .map(DuplicateGroup::kind);

        sensor.is_duplicate = kind.is_some();
        sensor.duplicate_tag = kind.map(|k| k.as_tag().to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_dedup_types::IntegrationId;

    fn sensor(entity_id: &str, integration: &str, group: Option<&str>) -> SensorRecord {
        SensorRecord {
            unit: "kWh".to_owned(),
            source_type: SourceType::Energy,
            duplicate_group: group.map(str::to_owned),
            friendly_name: entity_id.to_owned(),
            ..SensorRecord::new(entity_id, IntegrationId::parse(integration).unwrap())
        }
    }

    #[test]
    fn test_groups_need_two_members() {
        let sensors = vec![
            sensor("sensor.a", "shelly", Some("g1")),
            sensor("sensor.b", "tplink", Some("g1")),
            sensor("sensor.c", "shelly", Some("g2")),
        ];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());

        assert_eq!(groups.len(), 1);
        let g1 = &groups["g1"];
        assert_eq!(g1.members.len(), 2);
        assert_eq!(g1.members[0].entity_id, "sensor.a");
        assert_eq!(g1.kind(), GroupKind::MultiIntegration);
    }

    #[test]
    fn test_ignored_member_collapses_group() {
        let sensors = vec![
            sensor("sensor.a", "shelly", Some("g1")),
            sensor("sensor.b", "tplink", Some("g1")),
        ];
        let ignore: IgnoreSet = ["sensor.b"].into_iter().collect();
        let groups = group(&sensors, &ignore, &EnergyFilter::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_missing_signature_is_never_grouped() {
        let sensors = vec![
            sensor("sensor.a", "shelly", None),
            sensor("sensor.b", "shelly", None),
        ];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_duplicate_ids_count_once() {
        let sensors = vec![
            sensor("sensor.a", "shelly", Some("g1")),
            sensor("sensor.a", "shelly", Some("g1")),
        ];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_irrelevant_and_reference_sensors_skipped() {
        let mut voltage = sensor("sensor.v", "shelly", Some("g1"));
        voltage.unit = "V".to_owned();
        voltage.source_type = SourceType::Unknown;
        let mut reference = sensor("sensor.grid", "tplink", Some("g1"));
        reference.is_reference = true;
        let switch = sensor("switch.plug", "shelly", Some("g1"));

        let sensors = vec![sensor("sensor.a", "shelly", Some("g1")), voltage, reference, switch];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_partition_by_kind() {
        let sensors = vec![
            sensor("sensor.a", "shelly", Some("multi")),
            sensor("sensor.b", "tplink", Some("multi")),
            sensor("sensor.c", "shelly", Some("intra")),
            sensor("sensor.d", "shelly", Some("intra")),
        ];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());
        let (multi, intra) = partition_by_kind(&groups);
        assert_eq!(multi.len(), 1);
        assert_eq!(intra.len(), 1);
        assert_eq!(intra[0].signature, "intra");
    }

    #[test]
    fn test_annotate_sets_duplicate_tag() {
        let mut sensors = vec![
            sensor("sensor.a", "shelly", Some("g1")),
            sensor("sensor.b", "shelly", Some("g1")),
            sensor("sensor.c", "shelly", Some("g2")),
        ];
        let groups = group(&sensors, &IgnoreSet::default(), &EnergyFilter::default());
        annotate(sensors.iter_mut(), &groups);

        assert!(sensors[0].is_duplicate);
        assert_eq!(sensors[0].duplicate_tag.as_deref(), Some("intra-integration"));
        assert!(!sensors[2].is_duplicate);
        assert_eq!(sensors[2].duplicate_tag, None);
    }
}
