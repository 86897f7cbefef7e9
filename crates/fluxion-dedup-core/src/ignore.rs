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

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entity ids permanently excluded from grouping and selection.
///
/// Local mirror of the ignore store; only the engine mutates it, and only
/// after the store accepted the toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreSet(BTreeSet<String>);

impl IgnoreSet {
    pub fn contains(&self, entity_id: &str) -> bool {
        self.0.contains(entity_id)
    }

    pub fn insert(&mut self, entity_id: impl Into<String>) -> bool {
        self.0.insert(entity_id.into())
    }

    pub fn remove(&mut self, entity_id: &str) -> bool {
        self.0.remove(entity_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.is_empty())
                .collect(),
        )
    }
}
