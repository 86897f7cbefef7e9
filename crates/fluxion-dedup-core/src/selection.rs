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

//! Two-bucket selection state (Selected / Alternative) keyed by integration.
//!
//! Every known, non-ignored, non-reference sensor lives in exactly one bucket.
//! Empty per-integration lists are pruned immediately.

use crate::catalog::Catalog;
use crate::conflict::Conflict;
use crate::error::{EngineError, Result};
use crate::grouping::{self, GroupMap};
use crate::ignore::IgnoreSet;
use fluxion_dedup_types::{IntegrationId, SelectionEntry, SelectionPayload, SensorRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Selected,
    Alternative,
}

impl Bucket {
    pub fn is_selected(self) -> bool {
        self == Self::Selected
    }
}

type Buckets = BTreeMap<IntegrationId, Vec<SensorRecord>>;

/// Result of a bulk select over one integration.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Entities moved into Selected by this call
    pub activated: Vec<String>,
    /// Entities left in Alternative because they would conflict
    pub skipped: Vec<Conflict>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    selected: Buckets,
    alternative: Buckets,
}

impl SelectionState {
    /// Rebuild from a freshly loaded catalog. Ignored and reference sensors
    /// are left out entirely.
    pub fn from_catalog(catalog: &Catalog, ignore: &IgnoreSet) -> Self {
        let mut state = Self::default();
        for sensor in catalog.sensors() {
            if sensor.is_reference || ignore.contains(&sensor.entity_id) {
                continue;
            }
            let bucket = if sensor.selected {
                Bucket::Selected
            } else {
                Bucket::Alternative
            };
            state.insert(sensor.clone(), bucket);
        }
        state
    }

    pub fn selected(&self) -> &BTreeMap<IntegrationId, Vec<SensorRecord>> {
        &self.selected
    }

    pub fn alternative(&self) -> &BTreeMap<IntegrationId, Vec<SensorRecord>> {
        &self.alternative
    }

    fn buckets(&self, bucket: Bucket) -> &Buckets {
        match bucket {
            Bucket::Selected => &self.selected,
            Bucket::Alternative => &self.alternative,
        }
    }

    fn buckets_mut(&mut self, bucket: Bucket) -> &mut Buckets {
        match bucket {
            Bucket::Selected => &mut self.selected,
            Bucket::Alternative => &mut self.alternative,
        }
    }

    /// Bucket and owning integration of `entity_id`.
    pub fn locate(&self, entity_id: &str) -> Option<(Bucket, &IntegrationId)> {
        [Bucket::Selected, Bucket::Alternative]
            .into_iter()
            .find_map(|bucket| {
                self.buckets(bucket)
                    .iter()
                    .find(|(_, list)| list.iter().any(|s| s.entity_id == entity_id))
                    .map(|(integration, _)| (bucket, integration))
            })
    }

    pub fn get(&self, entity_id: &str) -> Option<&SensorRecord> {
        self.selected
            .values()
            .chain(self.alternative.values())
            .flatten()
            .find(|s| s.entity_id == entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.locate(entity_id).is_some()
    }

    pub fn is_selected(&self, entity_id: &str) -> bool {
        matches!(self.locate(entity_id), Some((Bucket::Selected, _)))
    }

    /// Insert a record into `bucket` unless it is already tracked.
    pub fn insert(&mut self, mut record: SensorRecord, bucket: Bucket) -> bool {
        if record.entity_id.is_empty() || self.contains(&record.entity_id) {
            return false;
        }
        record.selected = bucket.is_selected();
        self.buckets_mut(bucket)
            .entry(record.integration.clone())
            .or_default()
            .push(record);
        true
    }

    /// Drop a record from whichever bucket holds it.
    pub fn remove(&mut self, entity_id: &str) -> Option<(Bucket, SensorRecord)> {
        let (bucket, integration) = self
            .locate(entity_id)
            .map(|(bucket, integration)| (bucket, integration.clone()))?;
        let record = take_from(self.buckets_mut(bucket), &integration, entity_id)?;
        Some((bucket, record))
    }

    /// Move `entity_id` into `target`. Returns `None` for unknown ids and
    /// `Some(false)` when it already sits there.
    pub(crate) fn move_to(&mut self, entity_id: &str, target: Bucket) -> Option<bool> {
        let (current, integration) = self
            .locate(entity_id)
            .map(|(bucket, integration)| (bucket, integration.clone()))?;
        if current == target {
            return Some(false);
        }

        let mut record = take_from(self.buckets_mut(current), &integration, entity_id)?;
        record.selected = target.is_selected();
        let list = self.buckets_mut(target).entry(integration).or_default();
        if !list.iter().any(|s| s.entity_id == entity_id) {
            list.push(record);
        }
        Some(true)
    }

    /// Move a sensor from Alternative into Selected. Idempotent.
    ///
    /// Does not consult the conflict detector; callers that need the group
    /// uniqueness guarantee go through the engine.
    pub fn activate(&mut self, entity_id: &str) -> Result<bool> {
        self.move_to(entity_id, Bucket::Selected)
            .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_owned()))
    }

    /// Move a sensor from Selected into Alternative. Idempotent.
    pub fn deactivate(&mut self, entity_id: &str) -> Result<bool> {
        self.move_to(entity_id, Bucket::Alternative)
            .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_owned()))
    }

    /// Entity ids of every member of `integration`, selected ones first.
    pub fn members_of(&self, integration: &IntegrationId) -> Vec<String> {
        [Bucket::Selected, Bucket::Alternative]
            .into_iter()
            .filter_map(|bucket| self.buckets(bucket).get(integration))
            .flatten()
            .map(|s| s.entity_id.clone())
            .collect()
    }

    pub fn has_integration(&self, integration: &IntegrationId) -> bool {
        self.selected.contains_key(integration) || self.alternative.contains_key(integration)
    }

    /// Activate every member of `integration` that passes `guard`.
    ///
    /// Members are checked one by one against the state as it evolves, so two
    /// duplicates inside the same integration cannot both end up selected.
    pub fn select_all_in_integration<F>(
        &mut self,
        integration: &IntegrationId,
        mut guard: F,
    ) -> BatchOutcome
    where
        F: FnMut(&SelectionState, &str) -> Option<Conflict>,
    {
        let mut outcome = BatchOutcome::default();
        for entity_id in self.members_of(integration) {
            if self.is_selected(&entity_id) {
                continue;
            }
            if let Some(conflict) = guard(&*self, &entity_id) {
                debug!(
                    "[SELECTION] Skipping {} during bulk select: {}",
                    entity_id, conflict
                );
                outcome.skipped.push(conflict);
                continue;
            }
            if self.move_to(&entity_id, Bucket::Selected) == Some(true) {
                outcome.activated.push(entity_id);
            }
        }
        outcome
    }

    /// Deactivate every selected member of `integration`. Never conflicts.
    pub fn deselect_all_in_integration(&mut self, integration: &IntegrationId) -> Vec<String> {
        let ids: Vec<String> = self
            .selected
            .get(integration)
            .map(|list| list.iter().map(|s| s.entity_id.clone()).collect())
            .unwrap_or_default();

        ids.into_iter()
            .filter(|id| self.move_to(id, Bucket::Alternative) == Some(true))
            .collect()
    }

    /// Every tracked record, Selected first, in integration order.
    pub fn pool(&self) -> Vec<&SensorRecord> {
        self.selected
            .values()
            .chain(self.alternative.values())
            .flatten()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.selected
            .values()
            .chain(self.alternative.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.alternative.is_empty()
    }

    pub fn annotate_duplicates(&mut self, groups: &GroupMap) {
        grouping::annotate(
            self.selected
                .values_mut()
                .chain(self.alternative.values_mut())
                .flatten(),
            groups,
        );
    }

    /// Full-state write payload: every tracked sensor with its bucket flag.
    pub fn to_payload(&self) -> SelectionPayload {
        let mut payload = SelectionPayload::default();
        for (bucket, buckets) in [
            (Bucket::Selected, &self.selected),
            (Bucket::Alternative, &self.alternative),
        ] {
            for (integration, list) in buckets {
                payload
                    .integrations
                    .entry(integration.clone())
                    .or_default()
                    .extend(list.iter().map(|s| SelectionEntry {
                        entity_id: s.entity_id.clone(),
                        enabled: bucket.is_selected(),
                    }));
            }
        }
        payload
    }
}

fn take_from(
    buckets: &mut Buckets,
    integration: &IntegrationId,
    entity_id: &str,
) -> Option<SensorRecord> {
    let list = buckets.get_mut(integration)?;
    let position = list.iter().position(|s| s.entity_id == entity_id)?;
    let record = list.remove(position);
    if list.is_empty() {
        buckets.remove(integration);
    }
    Some(record)
}
