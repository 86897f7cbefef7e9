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

//! Error types for the selection engine

use crate::conflict::Conflict;
use crate::keep_best::SagaToken;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Expected, recoverable: the activation collides with an active group member
    #[error("{0}")]
    Conflict(Conflict),

    #[error("unknown sensor: {0}")]
    UnknownEntity(String),

    #[error("unknown integration: {0}")]
    UnknownIntegration(String),

    #[error("reference sensor {0} is not part of the selection")]
    ReferenceSensor(String),

    #[error("catalog load failed: {0}")]
    CatalogLoad(String),

    #[error("saving selection failed: {0}")]
    Persistence(String),

    #[error("selection saved, but ignoring {} sensor(s) failed: {reason}", failed.len())]
    PartialFailure {
        token: SagaToken,
        failed: Vec<String>,
        reason: String,
    },

    #[error("a selection save is already in flight")]
    SaveInFlight,

    #[error("unknown keep-best token: {0}")]
    UnknownSaga(SagaToken),
}

impl EngineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
