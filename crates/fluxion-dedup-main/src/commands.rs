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

//! Command execution against the selection engine.

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::output::{self, Report};
use anyhow::{Context, Result};
use fluxion_dedup_core::{
    CatalogSource, Collaborators, EngineError, InMemoryStore, SensorEngine, SystemClock,
    TracingNotifier,
};
use fluxion_dedup_ha::HaSensorStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often the debounce deadline is polled while waiting for a save
const SAVE_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    if cli.dry_run {
        info!("🔍 DRY RUN: changes are applied to an in-memory copy of the catalog");
    }

    let mut engine = connect(config, cli.dry_run).await?;
    let load = engine
        .load()
        .await
        .context("Failed to load sensor catalog")?;
    info!(
        "📋 Loaded {} sensor(s) into {} group(s), {} spanning multiple integrations",
        load.sensors, load.groups, load.multi_integration
    );

    let mutates = cli.command.mutates();
    let mut report = execute(&mut engine, cli.command, config).await?;
    report.dry_run = cli.dry_run && mutates;

    if mutates {
        wait_until_saved(&mut engine).await?;
    }
    output::print(&report, cli.output)
}

/// Build the engine on top of Home Assistant, or on an in-memory copy of its
/// catalog for dry runs.
async fn connect(config: &AppConfig, dry_run: bool) -> Result<SensorEngine> {
    let remote = Arc::new(HaSensorStore::connect(&config.store).await?);

    let collaborators = if dry_run {
        let snapshot = remote
            .fetch_catalog()
            .await
            .context("Failed to fetch catalog for dry run")?;
        Collaborators::in_memory(Arc::new(InMemoryStore::new(snapshot)))
    } else {
        Collaborators {
            catalog: remote.clone(),
            selection: remote.clone(),
            ignore: remote,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    };

    Ok(SensorEngine::new(config.engine.clone(), collaborators))
}

/// Drive the debounce pipeline until the selection is saved.
async fn wait_until_saved(engine: &mut SensorEngine) -> Result<()> {
    if !engine.has_unsaved_changes() {
        return Ok(());
    }

    info!(
        "💾 Waiting {} ms for the selection to settle",
        engine.config().debounce_ms
    );
    let mut ticker = tokio::time::interval(SAVE_POLL_INTERVAL);
    while engine.has_unsaved_changes() {
        tokio::select! {
            _ = ticker.tick() => {
                engine.tick().await.context("Selection was not saved")?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("⚠️ Interrupted, saving pending changes now");
                engine.save_now().await.context("Selection was not saved")?;
            }
        }
    }
    Ok(())
}

fn report(command: &'static str, summary: String, details: serde_json::Value) -> Report {
    Report {
        command,
        summary,
        details,
        dry_run: false,
    }
}

async fn execute(
    engine: &mut SensorEngine,
    command: Commands,
    config: &AppConfig,
) -> Result<Report> {
    match command {
        Commands::Groups => {
            let reviews = engine.review();
            Ok(report(
                "groups",
                output::review_table(&reviews),
                serde_json::to_value(&reviews)?,
            ))
        }

        Commands::AutoSelect => {
            let selection = engine.auto_select_best();
            let chosen: Vec<&str> = selection
                .chosen
                .iter()
                .map(|s| s.entity_id.as_str())
                .collect();
            let mut summary = format!("Resolved {} device(s)", selection.count);
            for sensor in &selection.chosen {
                summary.push_str(&format!(
                    "\n  ✓ {} ({}, score {})",
                    sensor.display_name(),
                    sensor.integration,
                    sensor.quality_score
                ));
            }
            Ok(report(
                "auto-select",
                summary,
                json!({ "count": selection.count, "chosen": chosen }),
            ))
        }

        Commands::KeepBest { entity_ids } => {
            let mut outcome = engine
                .keep_best(&entity_ids)
                .await
                .context("Keep best failed")?;

            if !outcome.status.is_completed() {
                warn!(
                    "⚠️ Ignoring the other sensors failed, retrying once ({})",
                    outcome.token
                );
                tokio::time::sleep(config.store.retry_delay()).await;
                outcome = engine
                    .retry_keep_best(outcome.token)
                    .await
                    .context("Retrying keep best failed")?;
            }
            let outcome = outcome
                .into_result()
                .context("Selection saved, but not every other sensor could be ignored")?;

            Ok(report(
                "keep-best",
                format!(
                    "Kept {} ({}), ignored {} other sensor(s)",
                    outcome.winner.display_name(),
                    outcome.winner.integration,
                    outcome.losers.len()
                ),
                json!({
                    "winner": outcome.winner.entity_id,
                    "ignored": outcome.losers,
                    "status": outcome.status,
                }),
            ))
        }

        Commands::Ignore { entity_ids } => {
            let failed = engine.ignore_many(&entity_ids).await;
            if !failed.is_empty() {
                anyhow::bail!("Failed to ignore: {}", failed.join(", "));
            }
            Ok(report(
                "ignore",
                format!("Ignored {} sensor(s)", entity_ids.len()),
                json!({ "ignored": entity_ids }),
            ))
        }

        Commands::Unignore { entity_ids } => {
            let mut restored = Vec::new();
            for entity_id in &entity_ids {
                if engine
                    .unignore(entity_id)
                    .await
                    .with_context(|| format!("Failed to unignore {entity_id}"))?
                {
                    restored.push(entity_id.as_str());
                }
            }
            Ok(report(
                "unignore",
                format!("Restored {} sensor(s)", restored.len()),
                json!({ "restored": restored }),
            ))
        }

        Commands::SelectAll { integration } => {
            let outcome = engine.select_all_in_integration(&integration)?;
            let mut summary = format!(
                "Activated {} sensor(s) of {integration}",
                outcome.activated.len()
            );
            for conflict in &outcome.skipped {
                summary.push_str(&format!("\n  ✗ {}: {conflict}", conflict.entity_id));
            }
            Ok(report(
                "select-all",
                summary,
                json!({ "activated": outcome.activated, "skipped": outcome.skipped }),
            ))
        }

        Commands::DeselectAll { integration } => {
            let deactivated = engine.deselect_all_in_integration(&integration)?;
            Ok(report(
                "deselect-all",
                format!(
                    "Deactivated {} sensor(s) of {integration}",
                    deactivated.len()
                ),
                json!({ "deactivated": deactivated }),
            ))
        }

        Commands::Activate { entity_id } => match engine.activate(&entity_id) {
            Ok(changed) => Ok(report(
                "activate",
                if changed {
                    format!("Activated {entity_id}")
                } else {
                    format!("{entity_id} was already active")
                },
                json!({ "entity_id": entity_id, "changed": changed }),
            )),
            Err(EngineError::Conflict(conflict)) => Ok(report(
                "activate",
                format!("Not activated: {conflict}"),
                json!({ "entity_id": entity_id, "changed": false, "conflict": conflict }),
            )),
            Err(e) => Err(e).with_context(|| format!("Failed to activate {entity_id}")),
        },

        Commands::Deactivate { entity_id } => {
            let changed = engine
                .deactivate(&entity_id)
                .with_context(|| format!("Failed to deactivate {entity_id}"))?;
            Ok(report(
                "deactivate",
                if changed {
                    format!("Deactivated {entity_id}")
                } else {
                    format!("{entity_id} was not active")
                },
                json!({ "entity_id": entity_id, "changed": changed }),
            ))
        }
    }
}
