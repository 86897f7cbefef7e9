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

//! Collaborator contracts for the catalog source and the two write stores,
//! plus an in-memory implementation of all three.
//!
//! The engine only ever talks to these traits; it never knows whether the
//! other side is Home Assistant or a test fixture.

use async_trait::async_trait;
use fluxion_dedup_types::{CatalogSnapshot, IgnoreToggle, SelectionPayload, SensorRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    /// Hint that the same request may succeed later
    pub retryable: bool,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Source of catalog loads. Must be side-effect free.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, StoreError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Accepts full-state selection payloads.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn save_selection(&self, payload: &SelectionPayload) -> Result<(), StoreError>;
}

/// Accepts single-item ignore toggles.
#[async_trait]
pub trait IgnoreStore: Send + Sync {
    async fn set_ignored(&self, toggle: &IgnoreToggle) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: CatalogSnapshot,
    selection_writes: usize,
    last_selection: Option<SelectionPayload>,
    ignore_writes: Vec<IgnoreToggle>,
    fail_selection: usize,
    fail_ignore: HashSet<String>,
    fail_catalog: bool,
}

/// Store backed by a [`CatalogSnapshot`] held in memory.
///
/// Selection payloads move records between the `selected` and `alternatives`
/// lists, ignore toggles edit the ignored list. Failures can be injected for
/// the write paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryStore {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                snapshot,
                ..MemoryInner::default()
            }),
        }
    }

    /// Reject the next `count` selection writes.
    pub fn fail_next_selection_writes(&self, count: usize) {
        self.inner.lock().fail_selection = count;
    }

    /// Reject every ignore toggle for `entity_id` until cleared.
    pub fn fail_ignore_for(&self, entity_id: impl Into<String>) {
        self.inner.lock().fail_ignore.insert(entity_id.into());
    }

    pub fn fail_catalog_loads(&self, fail: bool) {
        self.inner.lock().fail_catalog = fail;
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.fail_selection = 0;
        inner.fail_ignore.clear();
        inner.fail_catalog = false;
    }

    /// Selection writes attempted so far, failed ones included.
    pub fn selection_write_count(&self) -> usize {
        self.inner.lock().selection_writes
    }

    pub fn last_selection_payload(&self) -> Option<SelectionPayload> {
        self.inner.lock().last_selection.clone()
    }

    /// Ignore toggles accepted so far, in order.
    pub fn ignore_writes(&self) -> Vec<IgnoreToggle> {
        self.inner.lock().ignore_writes.clone()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.inner.lock().snapshot.clone()
    }
}

fn apply_selection(snapshot: &mut CatalogSnapshot, payload: &SelectionPayload) {
    for (integration, entries) in &payload.integrations {
        for entry in entries {
            let Some(mut record) = take_record(snapshot, &entry.entity_id) else {
                debug!(
                    "[MEMORY STORE] No record for {}, entry ignored",
                    entry.entity_id
                );
                continue;
            };
            record.selected = entry.enabled;
            let lists = if entry.enabled {
                &mut snapshot.selected
            } else {
                &mut snapshot.alternatives
            };
            lists
                .entry(integration.as_str().to_owned())
                .or_default()
                .push(record);
        }
    }
}

fn take_record(snapshot: &mut CatalogSnapshot, entity_id: &str) -> Option<SensorRecord> {
    for lists in [&mut snapshot.selected, &mut snapshot.alternatives] {
        if let Some(record) = take_from(lists, entity_id) {
            return Some(record);
        }
    }
    None
}

fn take_from(
    lists: &mut BTreeMap<String, Vec<SensorRecord>>,
    entity_id: &str,
) -> Option<SensorRecord> {
    let (key, position) = lists.iter().find_map(|(key, records)| {
        records
            .iter()
            .position(|r| r.entity_id == entity_id)
            .map(|position| (key.clone(), position))
    })?;
    let records = lists.get_mut(&key)?;
    let record = records.remove(position);
    if records.is_empty() {
        lists.remove(&key);
    }
    Some(record)
}

#[async_trait]
impl CatalogSource for InMemoryStore {
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        let inner = self.inner.lock();
        if inner.fail_catalog {
            return Err(StoreError::retryable("catalog unavailable"));
        }
        Ok(inner.snapshot.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl SelectionStore for InMemoryStore {
    async fn save_selection(&self, payload: &SelectionPayload) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.selection_writes += 1;
        if inner.fail_selection > 0 {
            inner.fail_selection -= 1;
            return Err(StoreError::retryable("selection store rejected the write"));
        }
        apply_selection(&mut inner.snapshot, payload);
        inner.last_selection = Some(payload.clone());
        Ok(())
    }
}

#[async_trait]
impl IgnoreStore for InMemoryStore {
    async fn set_ignored(&self, toggle: &IgnoreToggle) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_ignore.contains(&toggle.entity_id) {
            return Err(StoreError::retryable(format!(
                "ignore store rejected {}",
                toggle.entity_id
            )));
        }

        let ignored = &mut inner.snapshot.ignored;
        if toggle.ignore {
            if !ignored.contains(&toggle.entity_id) {
                ignored.push(toggle.entity_id.clone());
            }
        } else {
            ignored.retain(|id| id != &toggle.entity_id);
        }
        inner.ignore_writes.push(toggle.clone());
        Ok(())
    }
}
