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

use crate::config::{DEFAULT_API_PREFIX, DEFAULT_BASE_URL, SUPERVISOR_URL, StoreConfig};
use crate::errors::{HaError, HaResult};
use fluxion_dedup_types::{CatalogSnapshot, IgnoreToggle, SelectionPayload};
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// REST client for the energy integration's sensor endpoints
#[derive(Clone)]
pub struct EnergyStoreClient {
    base_url: String,
    prefix: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl fmt::Debug for EnergyStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnergyStoreClient")
            .field("base_url", &self.base_url)
            .field("prefix", &self.prefix)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl EnergyStoreClient {
    /// Create a client with default prefix, timeout and retry settings
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        Self::build(base_url.into(), token.into(), Duration::from_secs(10))
    }

    fn build(base_url: String, token: String, timeout: Duration) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            prefix: DEFAULT_API_PREFIX.to_owned(),
            token,
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Create a client from configuration, falling back to environment variables.
    ///
    /// Token lookup order: config, `HA_TOKEN`, `SUPERVISOR_TOKEN`. Without an
    /// explicit URL a supervisor token routes through the Supervisor proxy.
    pub fn from_config(config: &StoreConfig) -> HaResult<Self> {
        let supervisor_token = std::env::var("SUPERVISOR_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let base_url = config
            .base_url
            .clone()
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| {
                if supervisor_token.is_some() {
                    SUPERVISOR_URL.to_owned()
                } else {
                    DEFAULT_BASE_URL.to_owned()
                }
            });

        let token = config
            .token
            .clone()
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .or(supervisor_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config, HA_TOKEN or SUPERVISOR_TOKEN".to_owned(),
                )
            })?;

        info!("Initializing energy store client from configuration: {}", base_url);
        Ok(Self::build(base_url, token, config.timeout())?
            .with_prefix(&config.normalized_prefix())
            .with_retry_config(config.max_retries, config.retry_delay()))
    }

    /// Override the endpoint prefix (e.g. "/api/energy_sensors")
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_owned();
        self
    }

    /// Set custom retry configuration
    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, self.prefix, path)
    }

    /// Load the sensor catalog
    pub async fn fetch_catalog(&self) -> HaResult<CatalogSnapshot> {
        let url = self.endpoint("catalog");
        debug!("🔍 [HA STORE] Fetching sensor catalog");
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;
        let response = Self::check_status(response, "catalog").await?;

        let snapshot: CatalogSnapshot = response
            .json()
            .await
            .map_err(|e| HaError::InvalidResponse(format!("catalog: {e}")))?;
        info!(
            "✅ [HA STORE] Catalog: {} sensor(s), {} ignored",
            snapshot.sensor_count(),
            snapshot.ignored.len()
        );
        trace!("   Reference: {:?}", snapshot.reference);
        Ok(snapshot)
    }

    /// Write the full selection state
    pub async fn save_selection(&self, payload: &SelectionPayload) -> HaResult<()> {
        let url = self.endpoint("selection");
        info!(
            "💾 [HA STORE] Saving selection: {} sensor(s) in {} integration(s)",
            payload.entry_count(),
            payload.integrations.len()
        );
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(payload)
                    .send()
                    .await
            })
            .await?;
        Self::check_status(response, "selection").await?;

        info!("✅ [HA STORE] Selection saved");
        Ok(())
    }

    /// Toggle the ignore flag of one sensor
    pub async fn set_ignored(&self, toggle: &IgnoreToggle) -> HaResult<()> {
        let url = self.endpoint("ignore");
        info!(
            "🚫 [HA STORE] Setting ignore={} for {}",
            toggle.ignore, toggle.entity_id
        );

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(toggle)
                    .send()
                    .await
            })
            .await?;
        Self::check_status(response, "ignore").await?;

        debug!("✅ [HA STORE] Ignore flag updated for {}", toggle.entity_id);
        Ok(())
    }

    /// Health check - ping HA API
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if is_ok {
                    debug!("Health check passed");
                } else {
                    warn!("Health check failed: status {}", response.status());
                }
                Ok(is_ok)
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Map non-success statuses to errors. Never retried.
    async fn check_status(response: Response, what: &str) -> HaResult<Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => {
                error!("❌ [HA STORE] Endpoint not found: {}", what);
                Err(HaError::NotFound(what.to_owned()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA STORE] Authentication failed for: {}", what);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA STORE] {} returned {}: {}", what, status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Retry a request with exponential backoff. Only transport errors retry.
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(HaError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(url: String) -> EnergyStoreClient {
        EnergyStoreClient::new(url, "test_token")
            .unwrap()
            .with_retry_config(3, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_fetch_catalog_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/energy_sensors/catalog")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "selected": {
                        "shelly": [{"entity_id": "sensor.plug_energy", "unit": "kWh"}]
                    },
                    "alternatives": {
                        "tplink": [{"entity_id": "sensor.kasa_energy", "device_class": "energy"}]
                    },
                    "reference": {"entity_id": "sensor.grid"},
                    "ignored": ["sensor.old"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let snapshot = client(server.url()).fetch_catalog().await.unwrap();
        assert_eq!(snapshot.sensor_count(), 2);
        assert_eq!(snapshot.ignored, vec!["sensor.old"]);
        assert_eq!(snapshot.reference.unwrap().entity_id, "sensor.grid");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_catalog_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/energy_sensors/catalog")
            .with_status(401)
            .create_async()
            .await;

        let result = client(server.url()).fetch_catalog().await;
        assert!(matches!(result, Err(HaError::AuthenticationFailed)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_save_selection_posts_full_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/energy_sensors/selection")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "integrations": {
                    "shelly": [
                        {"entity_id": "sensor.a", "enabled": true},
                        {"entity_id": "sensor.b", "enabled": false}
                    ]
                }
            })))
            .with_status(200)
            .create_async()
            .await;

        let payload: SelectionPayload = serde_json::from_value(json!({
            "integrations": {
                "shelly": [
                    {"entity_id": "sensor.a", "enabled": true},
                    {"entity_id": "sensor.b", "enabled": false}
                ]
            }
        }))
        .unwrap();

        client(server.url()).save_selection(&payload).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/energy_sensors/selection")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let result = client(server.url())
            .save_selection(&SelectionPayload::default())
            .await;
        match result {
            Err(HaError::ApiError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_ignored_with_custom_prefix() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/custom/ignore")
            .match_body(Matcher::Json(json!({"entity_id": "sensor.x", "ignore": true})))
            .with_status(204)
            .create_async()
            .await;

        let client = client(server.url()).with_prefix("/custom");
        client
            .set_ignored(&IgnoreToggle::ignore("sensor.x"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_endpoint_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/energy_sensors/ignore")
            .with_status(404)
            .create_async()
            .await;

        let result = client(server.url())
            .set_ignored(&IgnoreToggle::restore("sensor.x"))
            .await;
        assert!(matches!(result, Err(HaError::NotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .create_async()
            .await;

        assert!(client(server.url()).ping().await.unwrap());
        mock.assert_async().await;
    }
}
