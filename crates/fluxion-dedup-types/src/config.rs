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
use std::time::Duration;

fn default_debounce_ms() -> u64 {
    500
}

fn default_entity_prefixes() -> Vec<String> {
    vec!["sensor.".to_owned()]
}

fn default_device_classes() -> Vec<String> {
    vec!["power".to_owned(), "energy".to_owned()]
}

fn default_units() -> Vec<String> {
    ["W", "kW", "Wh", "kWh"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period after the last mutation before the selection is saved
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Entity namespaces considered energy relevant (e.g. "sensor.")
    #[serde(default = "default_entity_prefixes")]
    pub entity_prefixes: Vec<String>,

    /// Device classes accepted for grouping
    #[serde(default = "default_device_classes")]
    pub allowed_device_classes: Vec<String>,

    /// Units accepted for grouping
    #[serde(default = "default_units")]
    pub allowed_units: Vec<String>,
}

impl EngineConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            entity_prefixes: default_entity_prefixes(),
            allowed_device_classes: default_device_classes(),
            allowed_units: default_units(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_window(), Duration::from_millis(500));
        assert_eq!(config.entity_prefixes, vec!["sensor.".to_owned()]);
        assert_eq!(config.allowed_units.len(), 4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"debounce_ms": 250}"#).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.allowed_device_classes, vec!["power", "energy"]);
    }
}
