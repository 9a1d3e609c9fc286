//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "aggregator": { "provider": "gocardless", "baseUrl": null,
//!                   "requestTimeoutSecs": 10, "safetyMarginSecs": 300 },
//!   "store": { "timeoutSecs": 10, "connectionPageSize": 200,
//!              "transactionPageSize": 500 },
//!   "secondary": { "accessToken": null }
//! }
//! ```
//! Keys this crate doesn't manage are preserved on save.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapters::gocardless::GOCARDLESS_BASE_URL_ENV;

pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable selecting the aggregator provider
pub const PROVIDER_ENV: &str = "BANKLINK_PROVIDER";

/// Which aggregator integration backs tokens and institution listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gocardless,
    Secondary,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gocardless => "gocardless",
            ProviderKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gocardless" | "nordigen" => Ok(ProviderKind::Gocardless),
            "secondary" => Ok(ProviderKind::Secondary),
            other => bail!("Unknown provider '{}' (expected gocardless or secondary)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_safety_margin")]
    pub safety_margin_secs: u64,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
            safety_margin_secs: default_safety_margin(),
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connection_page_size")]
    pub connection_page_size: u32,
    #[serde(default = "default_transaction_page_size")]
    pub transaction_page_size: u32,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_store_timeout(),
            connection_page_size: default_connection_page_size(),
            transaction_page_size: default_transaction_page_size(),
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondarySettings {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_safety_margin() -> u64 {
    300
}

fn default_store_timeout() -> u64 {
    10
}

fn default_connection_page_size() -> u32 {
    200
}

fn default_transaction_page_size() -> u32 {
    500
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    aggregator: AggregatorSettings,
    #[serde(default)]
    store: StoreSettings,
    #[serde(default)]
    secondary: SecondarySettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Banklink configuration with environment overrides applied
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub aggregator: AggregatorSettings,
    pub store: StoreSettings,
    pub secondary: SecondarySettings,
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

impl Config {
    /// Load settings from the data directory and apply environment
    /// overrides (`BANKLINK_PROVIDER`, `BANKLINK_GOCARDLESS_BASE_URL`)
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILE))?;
        let mut config = Self {
            aggregator: raw.aggregator,
            store: raw.store,
            secondary: raw.secondary,
        };

        if let Ok(provider) = std::env::var(PROVIDER_ENV) {
            config.aggregator.provider = provider
                .parse()
                .with_context(|| format!("Invalid {}", PROVIDER_ENV))?;
        }
        if let Ok(base_url) = std::env::var(GOCARDLESS_BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.aggregator.base_url = Some(base_url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Save to the data directory, preserving keys we don't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        self.validate()?;
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = read_settings(&settings_path).unwrap_or_default();
        settings.aggregator.provider = self.aggregator.provider;
        settings.aggregator.base_url = self.aggregator.base_url.clone();
        settings.aggregator.request_timeout_secs = self.aggregator.request_timeout_secs;
        settings.aggregator.safety_margin_secs = self.aggregator.safety_margin_secs;
        settings.store.timeout_secs = self.store.timeout_secs;
        settings.store.connection_page_size = self.store.connection_page_size;
        settings.store.transaction_page_size = self.store.transaction_page_size;
        settings.secondary.access_token = self.secondary.access_token.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.aggregator.base_url {
            let url = Url::parse(base_url)
                .with_context(|| format!("Invalid aggregator base URL '{}'", base_url))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("Aggregator base URL must use http or https");
            }
        }
        if self.aggregator.request_timeout_secs == 0 {
            bail!("aggregator.requestTimeoutSecs must be greater than zero");
        }
        if self.store.timeout_secs == 0 {
            bail!("store.timeoutSecs must be greater than zero");
        }
        if self.store.connection_page_size == 0 || self.store.transaction_page_size == 0 {
            bail!("store page sizes must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregator.request_timeout_secs)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.aggregator.safety_margin_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }
}
