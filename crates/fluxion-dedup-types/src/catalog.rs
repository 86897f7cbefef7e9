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

//! Shapes exchanged with the catalog source and the selection/ignore stores.

use crate::integration::IntegrationId;
use crate::sensor::SensorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Externally pinned reference sensor (e.g. the grid meter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSensor {
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

/// One catalog load as returned by the catalog source.
///
/// Keys of `selected`/`alternatives` are raw integration names from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub selected: BTreeMap<String, Vec<SensorRecord>>,

    #[serde(default)]
    pub alternatives: BTreeMap<String, Vec<SensorRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceSensor>,

    #[serde(default)]
    pub ignored: Vec<String>,
}

impl CatalogSnapshot {
    pub fn sensor_count(&self) -> usize {
        self.selected
            .values()
            .chain(self.alternatives.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_ignored(&self, entity_id: &str) -> bool {
        self.ignored.iter().any(|id| id == entity_id)
    }

    /// Integration key under which `entity_id` is listed, with its bucket flag.
    pub fn locate(&self, entity_id: &str) -> Option<(&str, bool)> {
        fn find<'a>(
            lists: &'a BTreeMap<String, Vec<SensorRecord>>,
            entity_id: &str,
        ) -> Option<&'a str> {
            lists.iter().find_map(|(key, records)| {
                records
                    .iter()
                    .any(|r| r.entity_id == entity_id)
                    .then_some(key.as_str())
            })
        }

        find(&self.selected, entity_id)
            .map(|key| (key, true))
            .or_else(|| find(&self.alternatives, entity_id).map(|key| (key, false)))
    }
}

/// `{entity_id, enabled}` entry of the selection write payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub entity_id: String,
    pub enabled: bool,
}

/// Full selection state as written to the selection store.
///
/// Always covers every known sensor; a missing entity means "no opinion".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPayload {
    pub integrations: BTreeMap<IntegrationId, Vec<SelectionEntry>>,
}

impl SelectionPayload {
    pub fn entry_count(&self) -> usize {
        self.integrations.values().map(Vec::len).sum()
    }

    pub fn is_enabled(&self, entity_id: &str) -> Option<bool> {
        self.integrations
            .values()
            .flatten()
            .find(|entry| entry.entity_id == entity_id)
            .map(|entry| entry.enabled)
    }
}

/// Single-item ignore store write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreToggle {
    pub entity_id: String,
    pub ignore: bool,
}

impl IgnoreToggle {
    pub fn ignore(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ignore: true,
        }
    }

    pub fn restore(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ignore: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_defaults_missing_sections() {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({
            "selected": {
                "shelly": [{"entity_id": "sensor.a", "unit": "W"}]
            }
        }))
        .unwrap();
        assert_eq!(snapshot.sensor_count(), 1);
        assert!(snapshot.alternatives.is_empty());
        assert!(snapshot.reference.is_none());
        assert_eq!(snapshot.locate("sensor.a"), Some(("shelly", true)));
        assert_eq!(snapshot.locate("sensor.b"), None);
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut payload = SelectionPayload::default();
        payload.integrations.insert(
            IntegrationId::parse("shelly").unwrap(),
            vec![SelectionEntry {
                entity_id: "sensor.a".to_owned(),
                enabled: true,
            }],
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({"integrations": {"shelly": [{"entity_id": "sensor.a", "enabled": true}]}})
        );
        assert_eq!(payload.is_enabled("sensor.a"), Some(true));
        assert_eq!(payload.is_enabled("sensor.b"), None);
    }
}
