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

//! Terminal rendering of command results.

use crate::cli::OutputFormat;
use anyhow::Result;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};
use fluxion_dedup_core::GroupReview;
use fluxion_dedup_types::GroupKind;
use serde::Serialize;
use serde_json::Value;

/// Outcome of one CLI command.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub command: &'static str,
    pub summary: String,
    pub details: Value,
    pub dry_run: bool,
}

pub fn print(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if report.dry_run {
                println!("(dry run, nothing was written back)");
            }
            println!("{}", report.summary);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Table of every duplicate group, recommended sensor highlighted.
pub fn review_table(reviews: &[GroupReview]) -> String {
    if reviews.is_empty() {
        return "No duplicate sensor groups found.".to_owned();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Device").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("Sensor").add_attribute(Attribute::Bold),
        Cell::new("Integration").add_attribute(Attribute::Bold),
        Cell::new("Type").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
        Cell::new("Active").add_attribute(Attribute::Bold),
    ]);

    for review in reviews {
        let kind = match review.kind {
            GroupKind::MultiIntegration => Cell::new(review.kind.as_tag()).fg(Color::Yellow),
            GroupKind::IntraIntegration => Cell::new(review.kind.as_tag()),
        };
        let device = match &review.area {
            Some(area) => format!("{}\n({area})", review.name),
            None => review.name.clone(),
        };

        for (idx, member) in review.members.iter().enumerate() {
            let recommended = review.recommended.as_deref() == Some(member.entity_id.as_str());
            let sensor = if recommended {
                Cell::new(format!("{} ★", member.friendly_name))
                    .fg(Color::Green)
                    .add_attribute(Attribute::Bold)
            } else {
                Cell::new(&member.friendly_name)
            };

            table.add_row(vec![
                Cell::new(if idx == 0 { device.as_str() } else { "" }),
                if idx == 0 { kind.clone() } else { Cell::new("") },
                sensor,
                Cell::new(member.integration.as_str()),
                Cell::new(member.source_type.as_str()),
                Cell::new(member.quality_score),
                Cell::new(if member.selected { "yes" } else { "-" }),
            ]);
        }
    }

    let multi = reviews
        .iter()
        .filter(|r| r.kind == GroupKind::MultiIntegration)
        .count();
    format!(
        "{table}\n{} group(s), {multi} spanning multiple integrations. ★ marks the recommended sensor.",
        reviews.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_dedup_core::ReviewMember;
    use fluxion_dedup_types::{IntegrationId, SourceType};

    fn member(entity_id: &str, integration: &str, score: u32, selected: bool) -> ReviewMember {
        ReviewMember {
            entity_id: entity_id.to_owned(),
            integration: IntegrationId::parse(integration).unwrap(),
            friendly_name: format!("{entity_id} name"),
            source_type: SourceType::Energy,
            quality_score: score,
            selected,
        }
    }

    #[test]
    fn test_empty_review() {
        assert_eq!(review_table(&[]), "No duplicate sensor groups found.");
    }

    #[test]
    fn test_review_table_lists_members() {
        let review = GroupReview {
            signature: "dev1".to_owned(),
            name: "Washing machine".to_owned(),
            area: Some("Laundry".to_owned()),
            kind: GroupKind::MultiIntegration,
            members: vec![
                member("sensor.shelly_energy", "shelly", 120, true),
                member("sensor.tplink_energy", "tplink", 110, false),
            ],
            recommended: Some("sensor.shelly_energy".to_owned()),
        };

        let rendered = review_table(&[review]);
        assert!(rendered.contains("Washing machine"));
        assert!(rendered.contains("sensor.shelly_energy name ★"));
        assert!(rendered.contains("tplink"));
        assert!(rendered.contains("1 group(s), 1 spanning multiple integrations"));
    }
}
