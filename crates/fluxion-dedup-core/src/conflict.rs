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

//! Activation conflict detection.
//!
//! A sensor may not be activated while another member of its duplicate group
//! with the same measurement type is already selected. Power and energy
//! readings of the same device never conflict with each other.

use crate::catalog::Catalog;
use crate::notify::Notifier;
use crate::selection::SelectionState;
use fluxion_dedup_types::{IntegrationId, Notification};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// An activation that collides with an already selected group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Sensor the caller tried to activate
    pub entity_id: String,
    pub conflicting_entity_id: String,
    pub conflicting_name: String,
    pub conflicting_integration: IntegrationId,
    /// Duplicate group signature shared by both sensors
    pub signature: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is already active via {} ({})",
            self.conflicting_name, self.conflicting_integration, self.conflicting_entity_id
        )
    }
}

/// First selected group member that would conflict with activating `entity_id`.
pub fn find_active_conflict(
    entity_id: &str,
    catalog: &Catalog,
    state: &SelectionState,
) -> Option<Conflict> {
    let candidate = catalog.get(entity_id)?;
    let signature = candidate.group_signature()?;
    let measurement = candidate.measurement_type();

    catalog
        .sensors()
        .iter()
        .filter(|other| other.entity_id != candidate.entity_id)
        .filter(|other| other.group_signature() == Some(signature))
        .filter(|other| other.measurement_type() == measurement)
        .find(|other| state.is_selected(&other.entity_id))
        .map(|other| Conflict {
            entity_id: candidate.entity_id.clone(),
            conflicting_entity_id: other.entity_id.clone(),
            conflicting_name: other.display_name().to_owned(),
            conflicting_integration: other.integration.clone(),
            signature: signature.to_owned(),
        })
}

/// Log a refused activation and surface it as a warning notification.
pub fn report(conflict: &Conflict, notifier: &dyn Notifier) {
    info!(
        "[CONFLICT] Activation of {} refused: {}",
        conflict.entity_id, conflict
    );
    notifier.notify(
        Notification::warning(format!("Cannot activate: {conflict}")).about(&conflict.entity_id),
    );
}

/// Conflict check with the side effect of surfacing a warning notification.
pub fn has_active_conflict(
    entity_id: &str,
    catalog: &Catalog,
    state: &SelectionState,
    notifier: &dyn Notifier,
) -> bool {
    find_active_conflict(entity_id, catalog, state)
        .inspect(|conflict| report(conflict, notifier))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::IgnoreSet;
    use crate::notify::ChannelNotifier;
    use crate::selection::Bucket;
    use fluxion_dedup_types::{NotificationLevel, SensorRecord, SourceType};

    fn sensor(entity_id: &str, integration: &str, source_type: SourceType) -> SensorRecord {
        SensorRecord {
            friendly_name: format!("{entity_id} name"),
            source_type,
            unit: match source_type {
                SourceType::Power => "W".to_owned(),
                SourceType::Energy | SourceType::Unknown => "kWh".to_owned(),
            },
            duplicate_group: Some("g1".to_owned()),
            ..SensorRecord::new(entity_id, IntegrationId::parse(integration).unwrap())
        }
    }

    fn setup() -> (Catalog, SelectionState) {
        let catalog = Catalog::from_records([
            (sensor("sensor.a", "shelly", SourceType::Energy), Bucket::Selected),
            (sensor("sensor.b", "tplink", SourceType::Energy), Bucket::Alternative),
            (sensor("sensor.c", "tplink", SourceType::Power), Bucket::Alternative),
        ]);
        let state = SelectionState::from_catalog(&catalog, &IgnoreSet::default());
        (catalog, state)
    }

    #[test]
    fn test_same_type_member_conflicts() {
        let (catalog, state) = setup();
        let conflict = find_active_conflict("sensor.b", &catalog, &state).unwrap();
        assert_eq!(conflict.conflicting_entity_id, "sensor.a");
        assert_eq!(conflict.conflicting_integration.as_str(), "shelly");
        assert_eq!(conflict.signature, "g1");
    }

    #[test]
    fn test_different_type_never_conflicts() {
        let (catalog, state) = setup();
        assert!(find_active_conflict("sensor.c", &catalog, &state).is_none());
    }

    #[test]
    fn test_ungrouped_sensor_never_conflicts() {
        let mut lonely = sensor("sensor.z", "shelly", SourceType::Energy);
        lonely.duplicate_group = None;
        let catalog = Catalog::from_records([
            (sensor("sensor.a", "shelly", SourceType::Energy), Bucket::Selected),
            (lonely, Bucket::Alternative),
        ]);
        let state = SelectionState::from_catalog(&catalog, &IgnoreSet::default());
        assert!(find_active_conflict("sensor.z", &catalog, &state).is_none());
    }

    #[test]
    fn test_has_active_conflict_notifies() {
        let (catalog, state) = setup();
        let (notifier, rx) = ChannelNotifier::new();

        assert!(has_active_conflict("sensor.b", &catalog, &state, &notifier));
        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.level, NotificationLevel::Warning);
        assert!(notification.message.contains("sensor.a name"));
        assert!(notification.message.contains("shelly"));

        assert!(!has_active_conflict("sensor.c", &catalog, &state, &notifier));
        assert!(rx.try_recv().is_err());
    }
}
