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

//! Review summary of duplicate groups for the UI review panel.

use crate::catalog::Catalog;
use crate::grouping::GroupMap;
use crate::selection::SelectionState;
use fluxion_dedup_types::{GroupKind, IntegrationId, SensorRecord, SourceType};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewMember {
    pub entity_id: String,
    pub integration: IntegrationId,
    pub friendly_name: String,
    pub source_type: SourceType,
    pub quality_score: u32,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReview {
    pub signature: String,
    pub name: String,
    pub area: Option<String>,
    pub kind: GroupKind,
    pub members: Vec<ReviewMember>,
    /// Highest scoring member, first one on ties
    pub recommended: Option<String>,
}

impl GroupReview {
    /// Entity ids currently selected inside this group.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|m| m.selected)
            .map(|m| m.entity_id.as_str())
    }
}

/// Every group with member scores and selection flags, multi-integration
/// groups first, then by signature.
pub fn review(groups: &GroupMap, catalog: &Catalog, state: &SelectionState) -> Vec<GroupReview> {
    let mut reviews: Vec<GroupReview> = groups
        .values()
        .map(|group| {
            let members: Vec<ReviewMember> = group
                .members
                .iter()
                .map(|member| {
                    let record = catalog.get(&member.entity_id);
                    ReviewMember {
                        entity_id: member.entity_id.clone(),
                        integration: member.integration.clone(),
                        friendly_name: member.friendly_name.clone(),
                        source_type: record.map(SensorRecord::measurement_type).unwrap_or_default(),
                        quality_score: record.map_or(0, |r| r.quality_score),
                        selected: state.is_selected(&member.entity_id),
                    }
                })
                .collect();

            let recommended = members
                .iter()
                .fold(None::<&ReviewMember>, |best, m| match best {
                    Some(b) if b.quality_score >= m.quality_score => Some(b),
                    _ => Some(m),
                })
                .map(|m| m.entity_id.clone());

            GroupReview {
                signature: group.signature.clone(),
                name: group.name.clone(),
                area: group.area.clone(),
                kind: group.kind(),
                members,
                recommended,
            }
        })
        .collect();

    reviews.sort_by(|a, b| {
        (a.kind != GroupKind::MultiIntegration)
            .cmp(&(b.kind != GroupKind::MultiIntegration))
            .then_with(|| a.signature.cmp(&b.signature))
    });
    reviews
}
