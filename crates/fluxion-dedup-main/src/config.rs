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

//! Application configuration with the add-on / file / environment fallback chain.

use anyhow::{Context, Result};
use fluxion_dedup_ha::StoreConfig;
use fluxion_dedup_types::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options file written by the Home Assistant Supervisor for add-ons
const ADDON_OPTIONS_PATH: &str = "/data/options.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Otherwise the first readable
    /// file of `/data/options.json`, `config.toml`, `config.json` is used,
    /// falling back to defaults. Environment variables are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::load_first(&Self::default_candidates())?.unwrap_or_else(|| {
                info!("📋 No config file found, using defaults");
                Self::default()
            }),
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn default_candidates() -> Vec<PathBuf> {
        vec![
            PathBuf::from(ADDON_OPTIONS_PATH),
            PathBuf::from("config.toml"),
            PathBuf::from("config.json"),
        ]
    }

    /// First candidate that exists, parsed. A file that exists but does not
    /// parse is an error rather than a silent skip.
    fn load_first(candidates: &[PathBuf]) -> Result<Option<Self>> {
        for path in candidates {
            if path.exists() {
                return Self::from_file(path).map(Some);
            }
            debug!("Config candidate {} not present", path.display());
        }
        Ok(None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };

        info!("✅ Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `HA_BASE_URL` and `HA_TOKEN` override the file, `SUPERVISOR_TOKEN`
    /// only fills a missing token.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("HA_BASE_URL") {
            debug!("Using HA_BASE_URL from environment");
            self.store.base_url = Some(url);
        }
        if let Some(token) = non_empty("HA_TOKEN") {
            self.store.token = Some(token);
        } else if self.store.token.is_none()
            && let Some(token) = non_empty("SUPERVISOR_TOKEN")
        {
            debug!("Using SUPERVISOR_TOKEN from environment");
            self.store.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.entity_prefixes.is_empty() {
            anyhow::bail!("engine.entity_prefixes must not be empty");
        }
        if self.engine.allowed_units.is_empty() {
            anyhow::bail!("engine.allowed_units must not be empty");
        }
        if self.engine.allowed_device_classes.is_empty() {
            anyhow::bail!("engine.allowed_device_classes must not be empty");
        }
        if self.store.timeout_secs == 0 {
            anyhow::bail!("store.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
