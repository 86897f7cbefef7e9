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

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::EnergyStoreClient;
use crate::config::StoreConfig;
use crate::errors::HaError;
use fluxion_dedup_core::{CatalogSource, IgnoreStore, SelectionStore, StoreError};
use fluxion_dedup_types::{CatalogSnapshot, IgnoreToggle, SelectionPayload};

impl From<HaError> for StoreError {
    fn from(error: HaError) -> Self {
        let retryable = error.is_retryable();
        let message = error.to_string();
        if retryable {
            StoreError::retryable(message)
        } else {
            StoreError::new(message)
        }
    }
}

/// Home Assistant adapter implementing the catalog source and both write stores
#[derive(Debug, Clone)]
pub struct HaSensorStore {
    client: Arc<EnergyStoreClient>,
}

impl HaSensorStore {
    pub fn new(client: Arc<EnergyStoreClient>) -> Self {
        Self { client }
    }

    /// Build the client from configuration and check that HA answers
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        let client = EnergyStoreClient::from_config(config)
            .context("Failed to create energy store client")?;

        if !client.ping().await.context("Health check failed")? {
            warn!(
                "⚠️ [HA STORE] {} did not answer the health check, continuing anyway",
                client.base_url()
            );
        }
        Ok(Self::new(Arc::new(client)))
    }

    /// Get reference to the underlying client
    pub fn client(&self) -> &Arc<EnergyStoreClient> {
        &self.client
    }
}

#[async_trait]
impl CatalogSource for HaSensorStore {
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        self.client.fetch_catalog().await.map_err(StoreError::from)
    }

    fn name(&self) -> &str {
        "Home Assistant"
    }
}

#[async_trait]
impl SelectionStore for HaSensorStore {
    async fn save_selection(&self, payload: &SelectionPayload) -> Result<(), StoreError> {
        debug!(
            "[HA STORE] Forwarding selection of {} sensor(s)",
            payload.entry_count()
        );
        self.client
            .save_selection(payload)
            .await
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl IgnoreStore for HaSensorStore {
    async fn set_ignored(&self, toggle: &IgnoreToggle) -> Result<(), StoreError> {
        self.client
            .set_ignored(toggle)
            .await
            .map_err(StoreError::from)
    }
}
