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

pub mod catalog;
pub mod config;
pub mod group;
pub mod integration;
pub mod notification;
pub mod sensor;

// Re-export common types for convenience
pub use catalog::{CatalogSnapshot, IgnoreToggle, ReferenceSensor, SelectionEntry, SelectionPayload};
pub use config::EngineConfig;
pub use group::{DuplicateGroup, GroupKind, GroupMember};
pub use integration::{IntegrationId, InvalidIntegrationId};
pub use notification::{Notification, NotificationLevel};
pub use sensor::{QualityTier, SensorRecord, SourceType, StateClass};
