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

//! Sensor quality scoring.
//!
//! Additive point system used to rank duplicate candidates. The score is
//! advisory; ranking and tie-breaking live in the auto-selection code.

use fluxion_dedup_types::{SensorRecord, StateClass};

pub const ENERGY_UNIT_POINTS: u32 = 100;
pub const POWER_UNIT_POINTS: u32 = 50;
pub const STATE_CLASS_TOTAL_POINTS: u32 = 20;
pub const STATE_CLASS_MEASUREMENT_POINTS: u32 = 10;
pub const PREMIUM_POINTS: u32 = 15;
pub const TOP_TIER_POINTS: u32 = 10;
pub const PHYSICAL_POINTS: u32 = 10;
pub const AVAILABLE_POINTS: u32 = 5;

/// Highest score a single sensor can reach.
pub const MAX_SCORE: u32 = ENERGY_UNIT_POINTS
    + STATE_CLASS_TOTAL_POINTS
    + PREMIUM_POINTS
    + TOP_TIER_POINTS
    + PHYSICAL_POINTS
    + AVAILABLE_POINTS;

/// Quality score of a sensor. Pure and total; missing attributes count as absent.
pub fn score(sensor: &SensorRecord) -> u32 {
    let unit = if sensor.is_energy_unit() {
        ENERGY_UNIT_POINTS
    } else if sensor.is_power_unit() {
        POWER_UNIT_POINTS
    } else {
        0
    };

    let state_class = match sensor.state_class {
        Some(StateClass::Total) => STATE_CLASS_TOTAL_POINTS,
        Some(StateClass::Measurement) => STATE_CLASS_MEASUREMENT_POINTS,
        Some(StateClass::TotalIncreasing | StateClass::Other) | None => 0,
    };

    let premium = if sensor.premium { PREMIUM_POINTS } else { 0 };

    let tier = match sensor.quality_tier {
        Some(tier) if tier.is_top_tier() => TOP_TIER_POINTS,
        _ => 0,
    };

    let physical = if sensor.is_virtual { 0 } else { PHYSICAL_POINTS };
    let available = if sensor.is_available() {
        AVAILABLE_POINTS
    } else {
        0
    };

    unit + state_class + premium + tier + physical + available
}

/// Recompute `quality_score` on every record in place.
pub fn annotate<'a>(sensors: impl IntoIterator<Item = &'a mut SensorRecord>) {
    for sensor in sensors {
        sensor.quality_score = score(sensor);
    }
}
