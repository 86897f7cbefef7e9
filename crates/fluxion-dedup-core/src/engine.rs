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

//! The engine context handle.
//!
//! [`SensorEngine`] owns the catalog, ignore set, duplicate groups, selection
//! state and persistence pipeline of one configuration session. All mutations
//! go through its methods; the collaborators are injected via
//! [`Collaborators`].

use crate::auto_select::{self, AutoSelection};
use crate::catalog::Catalog;
use crate::conflict::{self, find_active_conflict};
use crate::error::{EngineError, Result};
use crate::grouping::{self, EnergyFilter, GroupMap};
use crate::ignore::IgnoreSet;
use crate::keep_best::{
    KeepBestOutcome, KeepBestStatus, PendingIgnore, SagaLedger, SagaToken, apply_plan,
    plan_keep_best,
};
use crate::notify::{Notifier, TracingNotifier};
use crate::pipeline::{Clock, PersistencePipeline, PipelineStatus, SaveTicket, SystemClock};
use crate::review::{self, GroupReview};
use crate::selection::{BatchOutcome, Bucket, SelectionState};
use crate::store::{CatalogSource, IgnoreStore, InMemoryStore, SelectionStore, StoreError};
use fluxion_dedup_types::{
    EngineConfig, IgnoreToggle, IntegrationId, Notification, SelectionPayload,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External collaborators of the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogSource>,
    pub selection: Arc<dyn SelectionStore>,
    pub ignore: Arc<dyn IgnoreStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// All three stores backed by one [`InMemoryStore`], logging notifier and
    /// wall clock.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            selection: store.clone(),
            ignore: store,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("catalog", &self.catalog.name())
            .finish_non_exhaustive()
    }
}

/// Summary of one catalog load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub sensors: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub groups: usize,
    pub multi_integration: usize,
    /// Unsaved local edits were thrown away by this reload
    pub discarded_unsaved: bool,
}

/// Selection payload handed out by [`SensorEngine::start_flush`].
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub ticket: SaveTicket,
    pub payload: SelectionPayload,
}

#[derive(Debug)]
pub struct SensorEngine {
    config: EngineConfig,
    filter: EnergyFilter,
    collaborators: Collaborators,
    catalog: Catalog,
    ignore: IgnoreSet,
    groups: GroupMap,
    state: SelectionState,
    pipeline: PersistencePipeline,
    sagas: SagaLedger,
}

impl SensorEngine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            filter: EnergyFilter::from_config(&config),
            pipeline: PersistencePipeline::new(config.debounce_window()),
            config,
            collaborators,
            catalog: Catalog::default(),
            ignore: IgnoreSet::default(),
            groups: GroupMap::new(),
            state: SelectionState::default(),
            sagas: SagaLedger::default(),
        }
    }

    // ==================== Catalog ====================

    /// Fetch the catalog and rebuild every derived structure from scratch.
    ///
    /// Unsaved local edits are discarded; a reload is refused while a save
    /// is in flight.
    pub async fn load(&mut self) -> Result<LoadReport> {
        if self.pipeline.status() == PipelineStatus::Saving {
            return Err(EngineError::SaveInFlight);
        }

        let source = self.collaborators.catalog.name().to_owned();
        debug!("📥 [CATALOG] Loading catalog from {}", source);
        let snapshot = self
            .collaborators
            .catalog
            .fetch_catalog()
            .await
            .map_err(|e| {
                error!("❌ [CATALOG] Load from {} failed: {}", source, e);
                self.notify(Notification::error(format!("Loading sensors failed: {e}")));
                EngineError::CatalogLoad(e.message)
            })?;

        let discarded_unsaved = self.pipeline.is_dirty();
        if discarded_unsaved {
            warn!("⚠️ [CATALOG] Reload discards unsaved selection changes");
        }

        self.catalog = Catalog::from_snapshot(&snapshot);
        self.ignore = snapshot.ignored.iter().map(String::as_str).collect();
        self.regroup();
        self.state = SelectionState::from_catalog(&self.catalog, &self.ignore);
        self.pipeline.reset();

        let (multi, _) = grouping::partition_by_kind(&self.groups);
        let report = LoadReport {
            sensors: self.catalog.len(),
            skipped: self.catalog.skipped(),
            ignored: self.ignore.len(),
            groups: self.groups.len(),
            multi_integration: multi.len(),
            discarded_unsaved,
        };
        info!(
            "✅ [CATALOG] {} sensor(s), {} ignored, {} duplicate group(s) ({} multi-integration)",
            report.sensors, report.ignored, report.groups, report.multi_integration
        );
        Ok(report)
    }

    /// Recompute groups and duplicate annotations against the current ignore set.
    fn regroup(&mut self) {
        self.groups = grouping::group(self.catalog.sensors(), &self.ignore, &self.filter);
        self.catalog.annotate_duplicates(&self.groups);
        self.state.annotate_duplicates(&self.groups);
    }

    // ==================== Selection primitives ====================

    /// Activate one sensor, refusing when a same-type group member is active.
    ///
    /// Returns `Ok(false)` when the sensor already was selected.
    pub fn activate(&mut self, entity_id: &str) -> Result<bool> {
        self.ensure_selectable(entity_id)?;
        if self.state.is_selected(entity_id) {
            return Ok(false);
        }

        if let Some(conflict) = find_active_conflict(entity_id, &self.catalog, &self.state) {
            conflict::report(&conflict, self.collaborators.notifier.as_ref());
            return Err(EngineError::Conflict(conflict));
        }

        let changed = self.state.activate(entity_id)?;
        if changed {
            debug!("[SELECTION] Activated {}", entity_id);
            self.mutated();
        }
        Ok(changed)
    }

    pub fn deactivate(&mut self, entity_id: &str) -> Result<bool> {
        self.ensure_selectable(entity_id)?;
        let changed = self.state.deactivate(entity_id)?;
        if changed {
            debug!("[SELECTION] Deactivated {}", entity_id);
            self.mutated();
        }
        Ok(changed)
    }

    fn ensure_selectable(&self, entity_id: &str) -> Result<()> {
        if self.catalog.is_reference(entity_id) {
            return Err(EngineError::ReferenceSensor(entity_id.to_owned()));
        }
        if !self.state.contains(entity_id) {
            return Err(EngineError::UnknownEntity(entity_id.to_owned()));
        }
        Ok(())
    }

    fn integration(&self, raw: &str) -> Result<IntegrationId> {
        IntegrationId::parse(raw)
            .ok()
            .filter(|id| self.state.has_integration(id))
            .ok_or_else(|| EngineError::UnknownIntegration(raw.to_owned()))
    }

    /// Activate every member of an integration, skipping conflicting ones.
    ///
    /// The whole batch counts as one mutation for the pipeline.
    pub fn select_all_in_integration(&mut self, integration: &str) -> Result<BatchOutcome> {
        let integration = self.integration(integration)?;
        let catalog = &self.catalog;
        let outcome = self
            .state
            .select_all_in_integration(&integration, |state, entity_id| {
                find_active_conflict(entity_id, catalog, state)
            });

        for conflict in &outcome.skipped {
            debug!(
                "[SELECTION] Bulk select of {} skipped {}: {}",
                integration, conflict.entity_id, conflict
            );
        }
        if !outcome.activated.is_empty() {
            info!(
                "[SELECTION] Bulk selected {} sensor(s) in {}",
                outcome.activated.len(),
                integration
            );
            self.mutated();
        }
        Ok(outcome)
    }

    pub fn deselect_all_in_integration(&mut self, integration: &str) -> Result<Vec<String>> {
        let integration = self.integration(integration)?;
        let deactivated = self.state.deselect_all_in_integration(&integration);
        if !deactivated.is_empty() {
            info!(
                "[SELECTION] Bulk deselected {} sensor(s) in {}",
                deactivated.len(),
                integration
            );
            self.mutated();
        }
        Ok(deactivated)
    }

    /// Resolve every device group to its best sensor and schedule a save.
    pub fn auto_select_best(&mut self) -> AutoSelection {
        let selection = auto_select::auto_select_best(&mut self.state, &self.groups);
        if selection.count > 0 {
            self.mutated();
            self.notify(Notification::success(format!(
                "Auto-selected the best sensor for {} device group(s)",
                selection.count
            )));
        }
        selection
    }

    // ==================== Keep best ====================

    /// Keep the best of `entity_ids`, save the selection, then ignore the rest.
    ///
    /// A failed selection write aborts before any ignore write. A failed
    /// ignore write leaves the saga open; see [`Self::retry_keep_best`].
    pub async fn keep_best<S: AsRef<str>>(&mut self, entity_ids: &[S]) -> Result<KeepBestOutcome> {
        if self.pipeline.status() == PipelineStatus::Saving {
            return Err(EngineError::SaveInFlight);
        }
        let Some(plan) = plan_keep_best(entity_ids, &self.state) else {
            let ids: Vec<&str> = entity_ids.iter().map(AsRef::as_ref).collect();
            return Err(EngineError::UnknownEntity(ids.join(", ")));
        };

        info!(
            "🏆 [KEEP BEST] Keeping {} over {} other sensor(s)",
            plan.winner.entity_id,
            plan.losers.len()
        );
        if apply_plan(&plan, &mut self.state) || self.pipeline.is_dirty() {
            self.mutated();
            self.flush().await?;
        }

        let token = self.sagas.open(&plan);
        let status = self.run_ignore_step(token).await;
        let outcome = KeepBestOutcome {
            token,
            winner: plan.winner,
            losers: plan.losers,
            status,
        };
        self.announce(&outcome);
        Ok(outcome)
    }

    /// Replay only the ignore step of an open keep-best saga.
    pub async fn retry_keep_best(&mut self, token: SagaToken) -> Result<KeepBestOutcome> {
        let Some(pending) = self.sagas.get(token) else {
            return Err(EngineError::UnknownSaga(token));
        };
        let winner = pending.winner.clone();
        let losers = pending.losers.clone();

        info!("🔁 [KEEP BEST] Retrying ignore step of {}", token);
        let status = self.run_ignore_step(token).await;
        let outcome = KeepBestOutcome {
            token,
            winner,
            losers,
            status,
        };
        self.announce(&outcome);
        Ok(outcome)
    }

    pub fn pending_keep_best(&self) -> impl Iterator<Item = &PendingIgnore> {
        self.sagas.pending()
    }

    async fn run_ignore_step(&mut self, token: SagaToken) -> KeepBestStatus {
        let remaining = self
            .sagas
            .get(token)
            .map(|p| p.remaining.clone())
            .unwrap_or_default();

        let mut failed = Vec::new();
        let mut reason = String::new();
        for entity_id in remaining {
            if self.ignore.contains(&entity_id) {
                self.sagas.settle(token, &entity_id);
                continue;
            }
            match self.write_ignore(&entity_id, true).await {
                Ok(()) => {
                    self.apply_ignore(&entity_id);
                    self.sagas.settle(token, &entity_id);
                }
                Err(e) => {
                    reason = e.message;
                    failed.push(entity_id);
                }
            }
        }
        self.regroup();

        if failed.is_empty() {
            self.sagas.close(token);
            KeepBestStatus::Completed
        } else {
            KeepBestStatus::SelectionSavedIgnorePending { failed, reason }
        }
    }

    fn announce(&self, outcome: &KeepBestOutcome) {
        match &outcome.status {
            KeepBestStatus::Completed => self.notify(
                Notification::success(format!(
                    "Kept {} and ignored {} duplicate(s)",
                    outcome.winner.display_name(),
                    outcome.losers.len()
                ))
                .about(&outcome.winner.entity_id),
            ),
            KeepBestStatus::SelectionSavedIgnorePending { failed, reason } => {
                warn!(
                    "⚠️ [KEEP BEST] Selection saved, {} ignore(s) pending for {}: {}",
                    failed.len(),
                    outcome.token,
                    reason
                );
                self.notify(
                    Notification::warning(format!(
                        "Selection saved, but {} sensor(s) could not be ignored: {reason}",
                        failed.len()
                    ))
                    .about(&outcome.winner.entity_id),
                );
            }
        }
    }

    // ==================== Ignore ====================

    /// Permanently exclude a sensor. Written to the ignore store immediately.
    pub async fn ignore(&mut self, entity_id: &str) -> Result<bool> {
        if self.ignore.contains(entity_id) {
            return Ok(false);
        }
        if self.catalog.is_reference(entity_id) {
            return Err(EngineError::ReferenceSensor(entity_id.to_owned()));
        }
        if !self.catalog.contains(entity_id) {
            return Err(EngineError::UnknownEntity(entity_id.to_owned()));
        }

        self.write_ignore(entity_id, true)
            .await
            .map_err(|e| EngineError::Persistence(e.message))?;
        self.apply_ignore(entity_id);
        self.regroup();
        info!("🚫 [IGNORE] {} ignored", entity_id);
        Ok(true)
    }

    /// Lift an ignore and put the sensor back into the bucket it was loaded in.
    ///
    /// A sensor loaded as selected whose group meanwhile has an active
    /// same-type member comes back as an alternative instead.
    pub async fn unignore(&mut self, entity_id: &str) -> Result<bool> {
        if !self.ignore.contains(entity_id) {
            return Ok(false);
        }

        self.write_ignore(entity_id, false)
            .await
            .map_err(|e| EngineError::Persistence(e.message))?;
        self.ignore.remove(entity_id);

        if let Some(record) = self.catalog.get(entity_id).cloned() {
            let origin = self.catalog.origin(entity_id).unwrap_or(Bucket::Alternative);
            let conflict = origin
                .is_selected()
                .then(|| find_active_conflict(entity_id, &self.catalog, &self.state))
                .flatten();

            if let Some(conflict) = conflict {
                info!(
                    "[IGNORE] {} restored as alternative: {}",
                    entity_id, conflict
                );
                self.state.insert(record, Bucket::Alternative);
                self.mutated();
            } else {
                self.state.insert(record, origin);
            }
            self.regroup();
        }
        info!("↩️ [IGNORE] {} restored", entity_id);
        Ok(true)
    }

    /// Ignore several sensors one by one. Returns the ids that failed.
    pub async fn ignore_many<S: AsRef<str>>(&mut self, entity_ids: &[S]) -> Vec<String> {
        let mut failed = Vec::new();
        for entity_id in entity_ids.iter().map(AsRef::as_ref) {
            if let Err(e) = self.ignore(entity_id).await {
                debug!("[IGNORE] {} not ignored: {}", entity_id, e);
                failed.push(entity_id.to_owned());
            }
        }
        failed
    }

    async fn write_ignore(
        &self,
        entity_id: &str,
        ignore: bool,
    ) -> std::result::Result<(), StoreError> {
        let toggle = if ignore {
            IgnoreToggle::ignore(entity_id)
        } else {
            IgnoreToggle::restore(entity_id)
        };
        self.collaborators
            .ignore
            .set_ignored(&toggle)
            .await
            .inspect_err(|e| {
                error!(
                    "❌ [IGNORE] Writing ignore={} for {} failed: {}",
                    ignore, entity_id, e
                );
                self.notify(
                    Notification::error(format!("Updating ignore list failed: {e}"))
                        .about(entity_id),
                );
            })
    }

    fn apply_ignore(&mut self, entity_id: &str) {
        self.ignore.insert(entity_id);
        self.state.remove(entity_id);
    }

    // ==================== Persistence ====================

    fn mutated(&mut self) {
        self.pipeline.mark_dirty(self.collaborators.clock.now());
    }

    /// Save when the debounce deadline has passed. Returns whether a save ran.
    pub async fn tick(&mut self) -> Result<bool> {
        if !self.pipeline.is_due(self.collaborators.clock.now()) {
            return Ok(false);
        }
        self.flush().await.map(|()| true)
    }

    /// Save immediately, ignoring the debounce deadline.
    ///
    /// Returns `Ok(false)` when there is nothing to save.
    pub async fn save_now(&mut self) -> Result<bool> {
        match self.pipeline.status() {
            PipelineStatus::Saving => Err(EngineError::SaveInFlight),
            PipelineStatus::Clean => Ok(false),
            PipelineStatus::Dirty => self.flush().await.map(|()| true),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(PendingSave { ticket, payload }) = self.start_flush() else {
            return Ok(());
        };
        let result = self.collaborators.selection.save_selection(&payload).await;
        self.finish_flush(ticket, result)
    }

    /// Enter `Saving` and hand out the payload for an externally driven write.
    pub fn start_flush(&mut self) -> Option<PendingSave> {
        let ticket = self.pipeline.begin_save()?;
        let payload = self.state.to_payload();
        debug!(
            "💾 [PIPELINE] Saving {} sensor(s) across {} integration(s)",
            payload.entry_count(),
            payload.integrations.len()
        );
        Some(PendingSave { ticket, payload })
    }

    /// Settle a write started with [`Self::start_flush`].
    pub fn finish_flush(
        &mut self,
        ticket: SaveTicket,
        result: std::result::Result<(), StoreError>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                let status = self.pipeline.complete(ticket, Ok(()));
                info!("✅ [PIPELINE] Selection saved, now {}", status);
                Ok(())
            }
            Err(e) => {
                self.pipeline.complete(ticket, Err(e.message.clone()));
                error!("❌ [PIPELINE] Saving selection failed: {}", e);
                self.notify(Notification::error(format!(
                    "Saving sensor selection failed: {e}"
                )));
                Err(EngineError::Persistence(e.message))
            }
        }
    }

    // ==================== Accessors ====================

    fn notify(&self, notification: Notification) {
        self.collaborators.notifier.notify(notification);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn groups(&self) -> &GroupMap {
        &self.groups
    }

    pub fn ignore_set(&self) -> &IgnoreSet {
        &self.ignore
    }

    pub fn pipeline_status(&self) -> PipelineStatus {
        self.pipeline.status()
    }

    /// Whether closing the session now would lose edits.
    pub fn has_unsaved_changes(&self) -> bool {
        self.pipeline.is_dirty()
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.pipeline.last_error()
    }

    pub fn review(&self) -> Vec<GroupReview> {
        review::review(&self.groups, &self.catalog, &self.state)
    }
}
