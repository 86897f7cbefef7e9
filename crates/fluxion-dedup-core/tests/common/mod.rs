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

//! Shared fixtures for the engine integration tests.

#![expect(dead_code, reason = "each test binary uses a subset of the fixtures")]

use crossbeam_channel::Receiver;
use fluxion_dedup_core::{ChannelNotifier, Collaborators, InMemoryStore, ManualClock, SensorEngine};
use fluxion_dedup_types::{
    CatalogSnapshot, EngineConfig, IntegrationId, Notification, NotificationLevel, QualityTier,
    ReferenceSensor, SensorRecord, SourceType, StateClass,
};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fluxion_dedup_core=debug")
        .with_test_writer()
        .try_init();
}

fn base(entity_id: &str, integration: &str, group: Option<&str>, unit: &str) -> SensorRecord {
    SensorRecord {
        friendly_name: format!("Friendly {entity_id}"),
        unit: unit.to_owned(),
        duplicate_group: group.map(str::to_owned),
        ..SensorRecord::new(entity_id, IntegrationId::parse(integration).unwrap())
    }
}

/// Power sensor whose attributes add up to `score`.
pub fn power(entity_id: &str, integration: &str, group: Option<&str>, score: u32) -> SensorRecord {
    let mut record = base(entity_id, integration, group, "W");
    record.source_type = SourceType::Power;
    match score {
        110 => {
            record.state_class = Some(StateClass::Total);
            record.premium = true;
            record.quality_tier = Some(QualityTier::Gold);
            record.state = Some("42".to_owned());
        }
        100 => {
            record.state_class = Some(StateClass::Total);
            record.premium = true;
            record.state = Some("42".to_owned());
        }
        90 => {
            record.state_class = Some(StateClass::Total);
            record.quality_tier = Some(QualityTier::Platinum);
        }
        80 => record.state_class = Some(StateClass::Total),
        70 => record.state_class = Some(StateClass::Measurement),
        60 => {}
        50 => record.is_virtual = true,
        _ => panic!("no power fixture for score {score}"),
    }
    record
}

/// Energy sensor whose attributes add up to `score`.
pub fn energy(entity_id: &str, integration: &str, group: Option<&str>, score: u32) -> SensorRecord {
    let mut record = base(entity_id, integration, group, "kWh");
    record.source_type = SourceType::Energy;
    match score {
        130 => record.state_class = Some(StateClass::Total),
        120 => {
            record.state_class = Some(StateClass::Total);
            record.is_virtual = true;
        }
        110 => {}
        100 => record.is_virtual = true,
        _ => panic!("no energy fixture for score {score}"),
    }
    record
}

/// Snapshot listing each record under its own integration key.
pub fn snapshot(selected: Vec<SensorRecord>, alternatives: Vec<SensorRecord>) -> CatalogSnapshot {
    let mut snapshot = CatalogSnapshot::default();
    for record in selected {
        snapshot
            .selected
            .entry(record.integration.as_str().to_owned())
            .or_default()
            .push(record);
    }
    for record in alternatives {
        snapshot
            .alternatives
            .entry(record.integration.as_str().to_owned())
            .or_default()
            .push(record);
    }
    snapshot
}

pub fn with_reference(mut snapshot: CatalogSnapshot, entity_id: &str) -> CatalogSnapshot {
    snapshot.reference = Some(ReferenceSensor {
        entity_id: entity_id.to_owned(),
        friendly_name: None,
    });
    snapshot
}

pub fn window() -> Duration {
    EngineConfig::default().debounce_window()
}

pub struct Harness {
    pub engine: SensorEngine,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifications: Receiver<Notification>,
}

impl Harness {
    /// Engine over an in-memory store, already loaded.
    pub async fn load(snapshot: CatalogSnapshot) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryStore::new(snapshot));
        let clock = Arc::new(ManualClock::new());
        let (notifier, notifications) = ChannelNotifier::new();
        let collaborators = Collaborators::in_memory(store.clone())
            .with_notifier(Arc::new(notifier))
            .with_clock(clock.clone());

        let mut engine = SensorEngine::new(EngineConfig::default(), collaborators);
        engine.load().await.unwrap();
        Self {
            engine,
            store,
            clock,
            notifications,
        }
    }

    /// Let the debounce window pass and run one tick.
    pub async fn settle(&mut self) -> bool {
        self.clock.advance(window());
        self.engine.tick().await.unwrap()
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    pub fn drain_level(&self, level: NotificationLevel) -> Vec<Notification> {
        self.drain().into_iter().filter(|n| n.level == level).collect()
    }

    pub fn selected(&self, entity_id: &str) -> bool {
        self.engine.state().is_selected(entity_id)
    }
}
