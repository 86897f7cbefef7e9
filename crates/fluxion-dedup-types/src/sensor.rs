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

//! Discovered energy sensor records as delivered by the catalog source.

use crate::integration::{self, IntegrationId};
use serde::{Deserialize, Deserializer, Serialize};

/// HA state string for entities that are currently not reporting.
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Measurement type of a sensor (HA `device_class`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SourceType {
    Power,
    Energy,
    #[default]
    Unknown,
}

impl From<String> for SourceType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "power" => Self::Power,
            "energy" => Self::Energy,
            _ => Self::Unknown,
        }
    }
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Energy => "energy",
            Self::Unknown => "unknown",
        }
    }
}

/// HA `state_class` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum StateClass {
    Total,
    TotalIncreasing,
    Measurement,
    Other,
}

impl From<String> for StateClass {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "total" => Self::Total,
            "total_increasing" => Self::TotalIncreasing,
            "measurement" => Self::Measurement,
            _ => Self::Other,
        }
    }
}

/// Integration quality tier as published by the HA integration quality scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum QualityTier {
    Platinum,
    Gold,
    Silver,
    Bronze,
    Other,
}

impl From<String> for QualityTier {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "platinum" => Self::Platinum,
            "gold" => Self::Gold,
            "silver" => Self::Silver,
            "bronze" => Self::Bronze,
            _ => Self::Other,
        }
    }
}

impl QualityTier {
    pub fn is_top_tier(self) -> bool {
        matches!(self, Self::Platinum | Self::Gold)
    }
}

/// One discovered sensor entity.
///
/// `quality_score`, `is_duplicate` and `duplicate_tag` are derived and get
/// recomputed on every catalog load. `selected` mirrors the server-side flag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorRecord {
    #[serde(default)]
    pub entity_id: String,

    #[serde(default, deserialize_with = "integration::lenient")]
    pub integration: IntegrationId,

    #[serde(default)]
    pub friendly_name: String,

    #[serde(default)]
    pub unit: String,

    /// Accepts both "source_type" and HA's "device_class"
    #[serde(default, alias = "device_class")]
    pub source_type: SourceType,

    /// Device identity signature; empty strings are treated as "no group"
    #[serde(default, deserialize_with = "non_blank")]
    pub duplicate_group: Option<String>,

    #[serde(default, deserialize_with = "non_blank")]
    pub device_id: Option<String>,

    #[serde(default, deserialize_with = "non_blank")]
    pub device_name: Option<String>,

    #[serde(default, deserialize_with = "non_blank")]
    pub area: Option<String>,

    #[serde(default)]
    pub state_class: Option<StateClass>,

    #[serde(default)]
    pub premium: bool,

    #[serde(default)]
    pub quality_tier: Option<QualityTier>,

    #[serde(default)]
    pub is_virtual: bool,

    /// Last known HA state string
    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub quality_score: u32,

    #[serde(default)]
    pub is_duplicate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_tag: Option<String>,

    #[serde(default)]
    pub selected: bool,

    #[serde(default)]
    pub is_reference: bool,

    #[serde(default)]
    pub include_in_summary: bool,
}

impl SensorRecord {
    pub fn new(entity_id: impl Into<String>, integration: IntegrationId) -> Self {
        Self {
            entity_id: entity_id.into(),
            integration,
            ..Self::default()
        }
    }

    /// Friendly name, falling back to the entity id.
    pub fn display_name(&self) -> &str {
        if self.friendly_name.trim().is_empty() {
            &self.entity_id
        } else {
            &self.friendly_name
        }
    }

    pub fn is_energy_unit(&self) -> bool {
        is_energy_unit(&self.unit)
    }

    pub fn is_power_unit(&self) -> bool {
        is_power_unit(&self.unit)
    }

    /// Measurement type, inferred from the unit when the device class is missing.
    pub fn measurement_type(&self) -> SourceType {
        match self.source_type {
            SourceType::Unknown if self.is_energy_unit() => SourceType::Energy,
            SourceType::Unknown if self.is_power_unit() => SourceType::Power,
            other => other,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state
            .as_deref()
            .is_some_and(|state| !state.is_empty() && state != STATE_UNAVAILABLE)
    }

    pub fn group_signature(&self) -> Option<&str> {
        self.duplicate_group.as_deref()
    }
}

pub fn is_energy_unit(unit: &str) -> bool {
    matches!(unit.trim(), "kWh" | "Wh")
}

pub fn is_power_unit(unit: &str) -> bool {
    matches!(unit.trim(), "W" | "kW")
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_ha_shaped_record() {
        let record: SensorRecord = serde_json::from_value(json!({
            "entity_id": "sensor.shelly_plug_energy",
            "integration": "Shelly",
            "friendly_name": "Plug energy",
            "unit": "kWh",
            "device_class": "energy",
            "duplicate_group": "plug|kitchen|energy",
            "state_class": "total_increasing",
            "quality_tier": "gold",
            "state": "12.5"
        }))
        .unwrap();

        assert_eq!(record.integration.as_str(), "shelly");
        assert_eq!(record.source_type, SourceType::Energy);
        assert_eq!(record.state_class, Some(StateClass::TotalIncreasing));
        assert_eq!(record.quality_tier, Some(QualityTier::Gold));
        assert!(record.is_available());
        assert!(!record.selected);
    }

    #[test]
    fn test_blank_group_is_none() {
        let record: SensorRecord = serde_json::from_value(json!({
            "entity_id": "sensor.a",
            "duplicate_group": "  "
        }))
        .unwrap();
        assert_eq!(record.duplicate_group, None);
        assert!(record.integration.is_unknown());
    }

    #[test]
    fn test_unrecognized_enums_fall_back() {
        let record: SensorRecord = serde_json::from_value(json!({
            "entity_id": "sensor.a",
            "device_class": "voltage",
            "state_class": "weird",
            "quality_tier": "custom",
            "integration": ""
        }))
        .unwrap();
        assert_eq!(record.source_type, SourceType::Unknown);
        assert_eq!(record.state_class, Some(StateClass::Other));
        assert_eq!(record.quality_tier, Some(QualityTier::Other));
        assert!(record.integration.is_unknown());
    }

    #[test]
    fn test_measurement_type_inferred_from_unit() {
        let mut record = SensorRecord::new("sensor.a", IntegrationId::unknown());
        record.unit = "W".to_owned();
        assert_eq!(record.measurement_type(), SourceType::Power);
        record.unit = "Wh".to_owned();
        assert_eq!(record.measurement_type(), SourceType::Energy);
        record.source_type = SourceType::Power;
        assert_eq!(record.measurement_type(), SourceType::Power);
    }

    #[test]
    fn test_unavailable_state() {
        let mut record = SensorRecord::new("sensor.a", IntegrationId::unknown());
        assert!(!record.is_available());
        record.state = Some(STATE_UNAVAILABLE.to_owned());
        assert!(!record.is_available());
        record.state = Some("0".to_owned());
        assert!(record.is_available());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut record = SensorRecord::new("sensor.a", IntegrationId::unknown());
        assert_eq!(record.display_name(), "sensor.a");
        record.friendly_name = "Kitchen".to_owned();
        assert_eq!(record.display_name(), "Kitchen");
    }
}
