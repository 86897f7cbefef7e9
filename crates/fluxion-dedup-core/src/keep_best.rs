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

//! Keep-best: targeted auto-selection over an explicit list of sensors.
//!
//! Runs as a two-step saga. The selection write happens first; ignoring the
//! losers is a second, independent write per sensor. When the second step
//! fails the saga stays open under its [`SagaToken`] so only the ignore step
//! gets replayed.

use crate::auto_select::rank;
use crate::selection::{Bucket, SelectionState};
use chrono::{DateTime, Utc};
use fluxion_dedup_types::SensorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

/// Replay handle of an open keep-best saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaToken(u64);

impl SagaToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SagaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kb-{}", self.0)
    }
}

/// Winner and losers chosen from the resolvable part of an id list.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepBestPlan {
    pub winner: SensorRecord,
    pub losers: Vec<String>,
}

/// Rank the listed sensors by score. Unknown, ignored and repeated ids are
/// skipped; ties keep the order of the list.
pub fn plan_keep_best<S: AsRef<str>>(ids: &[S], state: &SelectionState) -> Option<KeepBestPlan> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut members: Vec<&SensorRecord> = ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .filter_map(|id| state.get(id))
        .collect();
    rank(&mut members);

    let (winner, losers) = members.split_first()?;
    Some(KeepBestPlan {
        winner: (*winner).clone(),
        losers: losers.iter().map(|s| s.entity_id.clone()).collect(),
    })
}

/// Move the winner into Selected and every loser into Alternative.
pub fn apply_plan(plan: &KeepBestPlan, state: &mut SelectionState) -> bool {
    let mut changed = state.move_to(&plan.winner.entity_id, Bucket::Selected) == Some(true);
    for loser in &plan.losers {
        changed |= state.move_to(loser, Bucket::Alternative) == Some(true);
    }
    changed
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeepBestStatus {
    /// Selection saved and every loser ignored
    Completed,
    /// Selection saved; these losers are deselected but not yet ignored
    SelectionSavedIgnorePending { failed: Vec<String>, reason: String },
}

impl KeepBestStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeepBestOutcome {
    pub token: SagaToken,
    pub winner: SensorRecord,
    pub losers: Vec<String>,
    pub status: KeepBestStatus,
}

impl KeepBestOutcome {
    /// Collapse a pending ignore step into [`EngineError::PartialFailure`].
    ///
    /// [`EngineError::PartialFailure`]: crate::error::EngineError::PartialFailure
    pub fn into_result(self) -> crate::error::Result<Self> {
        if let KeepBestStatus::SelectionSavedIgnorePending { failed, reason } = &self.status {
            return Err(crate::error::EngineError::PartialFailure {
                token: self.token,
                failed: failed.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self)
    }
}

/// Open saga: the selection write succeeded, these ignores are outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingIgnore {
    pub token: SagaToken,
    pub winner: SensorRecord,
    pub losers: Vec<String>,
    pub remaining: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingIgnore {
    pub fn is_settled(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Open sagas keyed by token. Tokens are never reused within one engine.
#[derive(Debug, Default)]
pub struct SagaLedger {
    next: u64,
    open: BTreeMap<SagaToken, PendingIgnore>,
}

impl SagaLedger {
    pub fn open(&mut self, plan: &KeepBestPlan) -> SagaToken {
        self.next += 1;
        let token = SagaToken(self.next);
        self.open.insert(
            token,
            PendingIgnore {
                token,
                winner: plan.winner.clone(),
                losers: plan.losers.clone(),
                remaining: plan.losers.clone(),
                created_at: Utc::now(),
            },
        );
        token
    }

    pub fn get(&self, token: SagaToken) -> Option<&PendingIgnore> {
        self.open.get(&token)
    }

    /// Drop `entity_id` from the outstanding ignores of `token`.
    pub fn settle(&mut self, token: SagaToken, entity_id: &str) {
        if let Some(pending) = self.open.get_mut(&token) {
            pending.remaining.retain(|id| id != entity_id);
        }
    }

    pub fn close(&mut self, token: SagaToken) -> Option<PendingIgnore> {
        self.open.remove(&token)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingIgnore> {
        self.open.values()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
