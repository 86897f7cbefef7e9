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

pub mod auto_select;
pub mod catalog;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod ignore;
pub mod keep_best;
pub mod notify;
pub mod pipeline;
pub mod review;
pub mod scoring;
pub mod selection;
pub mod store;

pub use auto_select::AutoSelection;
pub use catalog::Catalog;
pub use conflict::{Conflict, find_active_conflict, has_active_conflict};
pub use engine::{Collaborators, LoadReport, PendingSave, SensorEngine};
pub use error::{EngineError, Result};
pub use grouping::{EnergyFilter, GroupMap};
pub use ignore::IgnoreSet;
pub use keep_best::{KeepBestOutcome, KeepBestStatus, PendingIgnore, SagaToken};
pub use notify::{ChannelNotifier, Notifier, TracingNotifier};
pub use pipeline::{Clock, ManualClock, PersistencePipeline, PipelineStatus, SaveTicket, SystemClock};
pub use review::{GroupReview, ReviewMember};
pub use selection::{BatchOutcome, Bucket, SelectionState};
pub use store::{CatalogSource, IgnoreStore, InMemoryStore, SelectionStore, StoreError};
