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

//! End-to-end scenarios against the in-memory store.

mod common;

use common::{Harness, energy, power, snapshot};
use fluxion_dedup_core::grouping::{EnergyFilter, group};
use fluxion_dedup_core::{EngineError, IgnoreSet, KeepBestStatus, PipelineStatus};
use fluxion_dedup_types::NotificationLevel;

#[tokio::test]
async fn test_auto_select_promotes_best_of_group() {
    let mut h = Harness::load(snapshot(
        vec![],
        vec![
            energy("sensor.plug_a", "shelly", Some("g1"), 120),
            energy("sensor.plug_b", "tplink", Some("g1"), 100),
        ],
    ))
    .await;
    assert_eq!(h.engine.catalog().get("sensor.plug_a").unwrap().quality_score, 120);
    assert_eq!(h.engine.catalog().get("sensor.plug_b").unwrap().quality_score, 100);

    let result = h.engine.auto_select_best();
    assert_eq!(result.count, 1);
    assert_eq!(result.chosen[0].entity_id, "sensor.plug_a");
    assert!(h.selected("sensor.plug_a"));
    assert!(!h.selected("sensor.plug_b"));
    assert!(h.engine.state().contains("sensor.plug_b"));

    assert_eq!(h.engine.pipeline_status(), PipelineStatus::Dirty);
    assert!(h.settle().await);
    let payload = h.store.last_selection_payload().unwrap();
    assert_eq!(payload.is_enabled("sensor.plug_a"), Some(true));
    assert_eq!(payload.is_enabled("sensor.plug_b"), Some(false));
}

#[tokio::test]
async fn test_activation_conflict_is_refused_and_reported() {
    let mut h = Harness::load(snapshot(
        vec![power("sensor.a", "shelly", Some("g1"), 100)],
        vec![power("sensor.b", "tplink", Some("g1"), 90)],
    ))
    .await;

    let err = h.engine.activate("sensor.b").unwrap_err();
    let EngineError::Conflict(conflict) = &err else {
        panic!("expected conflict, got {err:?}");
    };
    assert_eq!(conflict.conflicting_entity_id, "sensor.a");
    assert!(!h.selected("sensor.b"));
    assert!(h.selected("sensor.a"));

    let warnings = h.drain_level(NotificationLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Friendly sensor.a"));
    assert!(warnings[0].message.contains("shelly"));
    assert!(!h.engine.has_unsaved_changes());
}

#[tokio::test]
async fn test_keep_best_selects_winner_and_ignores_losers() {
    let mut h = Harness::load(snapshot(
        vec![power("sensor.a", "shelly", Some("g1"), 50)],
        vec![
            power("sensor.b", "tplink", Some("g1"), 90),
            power("sensor.c", "tuya", Some("g1"), 70),
        ],
    ))
    .await;

    let outcome = h
        .engine
        .keep_best(&["sensor.a", "sensor.b", "sensor.c"])
        .await
        .unwrap();
    assert_eq!(outcome.winner.entity_id, "sensor.b");
    assert_eq!(outcome.status, KeepBestStatus::Completed);
    assert_eq!(h.store.selection_write_count(), 1);
    assert_eq!(h.engine.pipeline_status(), PipelineStatus::Clean);

    let payload = h.store.last_selection_payload().unwrap();
    assert_eq!(payload.is_enabled("sensor.b"), Some(true));
    assert_eq!(payload.is_enabled("sensor.a"), Some(false));
    assert_eq!(payload.is_enabled("sensor.c"), Some(false));

    h.engine.load().await.unwrap();
    let ignored: Vec<&str> = h.engine.ignore_set().iter().collect();
    assert_eq!(ignored, vec!["sensor.a", "sensor.c"]);
    assert!(h.selected("sensor.b"));
    assert!(!h.engine.state().contains("sensor.a"));
    assert!(!h.engine.state().contains("sensor.c"));
    assert!(h.engine.groups().is_empty());
}

#[tokio::test]
async fn test_bulk_select_skips_conflicting_member() {
    let mut h = Harness::load(snapshot(
        vec![power("sensor.kasa_plug", "tplink", Some("plug"), 90)],
        vec![
            power("sensor.shelly_plug", "shelly", Some("plug"), 100),
            energy("sensor.shelly_em", "shelly", None, 110),
            energy("sensor.shelly_heater", "shelly", Some("heater"), 130),
        ],
    ))
    .await;

    let outcome = h.engine.select_all_in_integration("Shelly").unwrap();
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].entity_id, "sensor.shelly_plug");
    assert_eq!(outcome.activated.len(), 2);
    assert!(!h.selected("sensor.shelly_plug"));
    assert!(h.selected("sensor.shelly_em"));
    assert!(h.selected("sensor.shelly_heater"));
    assert!(h.selected("sensor.kasa_plug"));
    assert!(h.drain().is_empty());

    assert!(!h.engine.tick().await.unwrap());
    assert!(h.settle().await);
    assert!(!h.settle().await);
    assert_eq!(h.store.selection_write_count(), 1);
    assert_eq!(h.engine.pipeline_status(), PipelineStatus::Clean);
}

#[tokio::test]
async fn test_signature_with_single_active_member_is_not_a_group() {
    let mut h = Harness::load(snapshot(
        vec![],
        vec![
            energy("sensor.x1", "shelly", Some("gx"), 110),
            energy("sensor.x2", "tplink", Some("gx"), 110),
            energy("sensor.y1", "shelly", Some("gy"), 110),
            energy("sensor.y2", "shelly", Some("gy"), 110),
        ],
    ))
    .await;
    assert_eq!(h.engine.groups().len(), 2);

    assert!(h.engine.ignore("sensor.x2").await.unwrap());
    assert!(!h.engine.groups().contains_key("gx"));
    assert!(h.engine.groups().contains_key("gy"));
    assert!(!h.engine.catalog().get("sensor.x1").unwrap().is_duplicate);

    let ignore: IgnoreSet = ["sensor.x2"].into_iter().collect();
    let groups = group(h.engine.catalog().sensors(), &ignore, &EnergyFilter::default());
    assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["gy"]);
}
