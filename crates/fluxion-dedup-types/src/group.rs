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

use crate::integration::IntegrationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Member entry of a duplicate group. Scores are layered on by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub entity_id: String,
    pub integration: IntegrationId,
    pub friendly_name: String,
}

/// Sensors believed to measure the same quantity on the same physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub signature: String,
    pub name: String,
    pub area: Option<String>,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.members.iter().any(|m| m.entity_id == entity_id)
    }

    pub fn integrations(&self) -> BTreeSet<&IntegrationId> {
        self.members.iter().map(|m| &m.integration).collect()
    }

    pub fn kind(&self) -> GroupKind {
        if self.integrations().len() >= 2 {
            GroupKind::MultiIntegration
        } else {
            GroupKind::IntraIntegration
        }
    }
}

/// Presentation classification of a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// Members span two or more integrations
    MultiIntegration,
    /// All members come from one integration
    IntraIntegration,
}

impl GroupKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::MultiIntegration => "multi-integration",
            Self::IntraIntegration => "intra-integration",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
