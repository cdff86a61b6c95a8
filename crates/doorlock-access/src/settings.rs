//! Required factor count lookup.

use crate::AdmissionError;
use doorlock_core::constants::{DEFAULT_REQUIRED_FACTORS, MAX_FACTORS};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, warn};

/// Source of the number of factors a session needs before a decision.
pub trait SettingsStore: Send + Sync + 'static {
    /// Current required factor count, always in `1..=3`.
    ///
    /// Lookups never fail: implementations fall back to a default.
    fn required_factor_count(&self) -> impl Future<Output = u8> + Send;
}

/// A constant factor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSettings(u8);

impl FixedSettings {
    pub fn new(required: u8) -> Self {
        Self(clamp_factors(required))
    }
}

impl Default for FixedSettings {
    fn default() -> Self {
        Self(DEFAULT_REQUIRED_FACTORS)
    }
}

impl SettingsStore for FixedSettings {
    async fn required_factor_count(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    min_required: Option<u8>,
}

/// Reads `min_required` from the settings service on every lookup.
#[derive(Debug, Clone)]
pub struct HttpSettingsStore {
    client: reqwest::Client,
    url: String,
    fallback: u8,
}

impl HttpSettingsStore {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            fallback: DEFAULT_REQUIRED_FACTORS,
        }
    }

    /// Count used when the service is unreachable or omits the field.
    pub fn with_fallback(mut self, fallback: u8) -> Self {
        self.fallback = clamp_factors(fallback);
        self
    }

    async fn fetch(&self) -> Result<Option<u8>, AdmissionError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let settings: SettingsResponse = response.json().await?;
        Ok(settings.min_required)
    }
}

impl SettingsStore for HttpSettingsStore {
    async fn required_factor_count(&self) -> u8 {
        match self.fetch().await {
            Ok(Some(required)) => clamp_factors(required),
            Ok(None) => {
                debug!(url = %self.url, "min_required not set, using fallback");
                self.fallback
            }
            Err(e) => {
                warn!(url = %self.url, "Failed to fetch settings: {}", e);
                self.fallback
            }
        }
    }
}

fn clamp_factors(required: u8) -> u8 {
    required.clamp(1, MAX_FACTORS)
}
