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

//! Normalized sensor catalog built from one catalog load.

use crate::grouping::{self, GroupMap};
use crate::scoring;
use crate::selection::Bucket;
use fluxion_dedup_types::{CatalogSnapshot, IntegrationId, ReferenceSensor, SensorRecord};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Flat, id-indexed view of every sensor the catalog source returned, in load
/// order (selected lists first, then alternatives).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sensors: Vec<SensorRecord>,
    index: HashMap<String, usize>,
    origin: HashMap<String, Bucket>,
    reference: Option<ReferenceSensor>,
    skipped: usize,
    duplicate_ids: usize,
}

impl Catalog {
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let mut catalog = Self {
            reference: snapshot.reference.clone(),
            ..Self::default()
        };

        let lists = snapshot
            .selected
            .iter()
            .map(|(key, records)| (key, records, Bucket::Selected))
            .chain(
                snapshot
                    .alternatives
                    .iter()
                    .map(|(key, records)| (key, records, Bucket::Alternative)),
            );

        for (key, records, bucket) in lists {
            let key_integration = IntegrationId::parse(key).ok();
            for record in records {
                let mut record = record.clone();
                if record.integration.is_unknown()
                    && let Some(integration) = &key_integration
                {
                    record.integration = integration.clone();
                }
                catalog.push(record, bucket);
            }
        }

        if catalog.skipped > 0 {
            warn!(
                "⚠️ [CATALOG] Skipped {} record(s) without entity_id",
                catalog.skipped
            );
        }
        if catalog.duplicate_ids > 0 {
            debug!(
                "[CATALOG] Dropped {} repeated entity id(s), first occurrence kept",
                catalog.duplicate_ids
            );
        }
        catalog
    }

    /// Build from explicit `(record, bucket)` pairs.
    pub fn from_records(records: impl IntoIterator<Item = (SensorRecord, Bucket)>) -> Self {
        let mut catalog = Self::default();
        for (record, bucket) in records {
            catalog.push(record, bucket);
        }
        catalog
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceSensor) -> Self {
        if let Some(&idx) = self.index.get(&reference.entity_id) {
            self.sensors[idx].is_reference = true;
        }
        self.reference = Some(reference);
        self
    }

    fn push(&mut self, mut record: SensorRecord, bucket: Bucket) {
        let entity_id = record.entity_id.trim().to_owned();
        if entity_id.is_empty() {
            self.skipped += 1;
            return;
        }
        if self.index.contains_key(&entity_id) {
            self.duplicate_ids += 1;
            return;
        }

        record.entity_id.clone_from(&entity_id);
        record.selected = bucket == Bucket::Selected;
        record.is_reference = record.is_reference
            || self
                .reference
                .as_ref()
                .is_some_and(|r| r.entity_id == entity_id);
        record.quality_score = scoring::score(&record);

        self.index.insert(entity_id.clone(), self.sensors.len());
        self.origin.insert(entity_id, bucket);
        self.sensors.push(record);
    }

    pub fn get(&self, entity_id: &str) -> Option<&SensorRecord> {
        self.index.get(entity_id).map(|&idx| &self.sensors[idx])
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.index.contains_key(entity_id)
    }

    pub fn sensors(&self) -> &[SensorRecord] {
        &self.sensors
    }

    /// Bucket the sensor was listed in at load time.
    pub fn origin(&self, entity_id: &str) -> Option<Bucket> {
        self.origin.get(entity_id).copied()
    }

    pub fn reference(&self) -> Option<&ReferenceSensor> {
        self.reference.as_ref()
    }

    pub fn is_reference(&self, entity_id: &str) -> bool {
        self.get(entity_id).is_some_and(|s| s.is_reference)
    }

    /// Records dropped for a missing entity id.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn annotate_duplicates(&mut self, groups: &GroupMap) {
        grouping::annotate(self.sensors.iter_mut(), groups);
    }
}
