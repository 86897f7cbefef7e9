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

//! Debounced persistence state machine (Clean, Dirty, Saving).
//!
//! The pipeline holds no timer of its own. Callers feed it the current time
//! from a [`Clock`] and poll [`PersistencePipeline::is_due`]; only one save
//! may be in flight, identified by its [`SaveTicket`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Time source for the debounce deadline.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Clean,
    Dirty,
    Saving,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
        };
        f.write_str(label)
    }
}

/// Handle of the single in-flight save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    generation: u64,
}

#[derive(Debug)]
pub struct PersistencePipeline {
    window: Duration,
    status: PipelineStatus,
    deadline: Option<Instant>,
    generation: u64,
    dirty_during_save: bool,
    last_error: Option<String>,
}

impl PersistencePipeline {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            status: PipelineStatus::Clean,
            deadline: None,
            generation: 0,
            dirty_during_save: false,
            last_error: None,
        }
    }

    /// Record a mutation and push the deadline out by one window.
    ///
    /// While a save is in flight the mutation is queued: the status stays
    /// `Saving` and the pipeline falls back to `Dirty` once the save settles.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
        match self.status {
            PipelineStatus::Saving => {
                self.dirty_during_save = true;
                trace!("[PIPELINE] Mutation queued behind in-flight save");
            }
            PipelineStatus::Clean | PipelineStatus::Dirty => {
                self.status = PipelineStatus::Dirty;
            }
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.status == PipelineStatus::Dirty && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Enter `Saving`. Returns `None` unless the pipeline is `Dirty`.
    pub fn begin_save(&mut self) -> Option<SaveTicket> {
        if self.status != PipelineStatus::Dirty {
            return None;
        }
        self.status = PipelineStatus::Saving;
        self.deadline = None;
        self.dirty_during_save = false;
        self.generation += 1;
        debug!("[PIPELINE] Save #{} started", self.generation);
        Some(SaveTicket {
            generation: self.generation,
        })
    }

    /// Settle the save identified by `ticket`.
    ///
    /// A failed save leaves the pipeline `Dirty` without a deadline, so only
    /// the next mutation or an explicit save re-arms it.
    pub fn complete(&mut self, ticket: SaveTicket, result: Result<(), String>) -> PipelineStatus {
        if self.status != PipelineStatus::Saving || ticket.generation != self.generation {
            warn!(
                "⚠️ [PIPELINE] Ignoring stale save #{} (current #{})",
                ticket.generation, self.generation
            );
            return self.status;
        }

        let queued = std::mem::take(&mut self.dirty_during_save);
        match result {
            Ok(()) => {
                self.last_error = None;
                if queued {
                    self.status = PipelineStatus::Dirty;
                } else {
                    self.status = PipelineStatus::Clean;
                    self.deadline = None;
                }
            }
            Err(message) => {
                self.last_error = Some(message);
                self.status = PipelineStatus::Dirty;
                if !queued {
                    self.deadline = None;
                }
            }
        }
        self.status
    }

    /// Forget everything after a full reload. Outstanding tickets go stale.
    pub fn reset(&mut self) {
        self.status = PipelineStatus::Clean;
        self.deadline = None;
        self.dirty_during_save = false;
        self.last_error = None;
        self.generation += 1;
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn is_dirty(&self) -> bool {
        self.status != PipelineStatus::Clean
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
