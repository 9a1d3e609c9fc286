//! GoCardless Bank Account Data API client
//!
//! Handles communication with the GoCardless (formerly Nordigen) API for
//! token management, institution listing and requisitions.
//!
//! API Documentation: https://developer.gocardless.com/bank-account-data/overview

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::{Institution, RefreshedToken, Requisition, RequisitionRequest, TokenPair};
use crate::ports::AggregatorApi;

// =============================================================================
// API Request/Response Models (GoCardless Bank Account Data v2)
// =============================================================================

#[derive(Serialize)]
struct NewTokenRequest<'a> {
    secret_id: &'a str,
    secret_key: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    refresh: &'a str,
}

/// Institution as returned by `GET /institutions/`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoCardlessInstitution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bic: Option<String>,
    /// API returns a string ("730"), we accept both
    #[serde(default, deserialize_with = "deserialize_optional_days")]
    pub transaction_total_days: Option<u32>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl From<GoCardlessInstitution> for Institution {
    fn from(gc: GoCardlessInstitution) -> Self {
        Institution {
            id: gc.id,
            name: gc.name,
            bic: gc.bic.filter(|b| !b.trim().is_empty()),
            transaction_total_days: gc.transaction_total_days,
            countries: gc.countries,
            logo: gc.logo,
        }
    }
}

/// Deserialize a day count that can be number or string
fn deserialize_optional_days<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("day count out of range")),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid day count: {}", e))),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for day count")),
    }
}

// =============================================================================
// GoCardless HTTP Client
// =============================================================================

/// Default production API URL
const GOCARDLESS_PRODUCTION_URL: &str = "https://bankaccountdata.gocardless.com/api/v2";

/// Environment variable to override the GoCardless API base URL.
/// Set this to point at a sandbox or mock server.
pub const GOCARDLESS_BASE_URL_ENV: &str = "BANKLINK_GOCARDLESS_BASE_URL";

/// Default timeout applied to every aggregator call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the GoCardless base URL, checking environment variable first
pub fn get_base_url() -> String {
    std::env::var(GOCARDLESS_BASE_URL_ENV)
        .unwrap_or_else(|_| GOCARDLESS_PRODUCTION_URL.to_string())
}

/// GoCardless API client
#[derive(Debug)]
pub struct GoCardlessClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GoCardlessClient {
    /// Create a client for the production API (or `BANKLINK_GOCARDLESS_BASE_URL`)
    pub fn new() -> Result<Self> {
        Self::new_with_base_url(&get_base_url(), DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom base URL and request timeout
    pub fn new_with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::Config("GoCardless base URL cannot be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a success body
    fn send<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .map_err(|e| self.map_request_error(endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| self.map_request_error(endpoint, e))?;

        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Map request errors to transport/timeout errors
    fn map_request_error(&self, endpoint: &str, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(format!(
                "GoCardless {} did not respond within {} seconds",
                endpoint,
                self.timeout.as_secs()
            ))
        } else if error.is_connect() {
            Error::Transport(format!("Unable to connect to GoCardless ({})", endpoint))
        } else {
            Error::Transport(format!("GoCardless {} request failed: {}", endpoint, error))
        }
    }
}

impl AggregatorApi for GoCardlessClient {
    fn new_token(&self, secret_id: &str, secret_key: &str) -> Result<TokenPair> {
        let request = self
            .client
            .post(self.url("/token/new/"))
            .json(&NewTokenRequest { secret_id, secret_key });
        self.send("token/new", request)
    }

    fn refresh_token(&self, refresh: &str) -> Result<RefreshedToken> {
        let request = self
            .client
            .post(self.url("/token/refresh/"))
            .json(&RefreshTokenRequest { refresh });
        self.send("token/refresh", request)
    }

    fn list_institutions(&self, access_token: &str, country: &str) -> Result<Vec<Institution>> {
        let request = self
            .client
            .get(self.url(&format!("/institutions/?country={}", country)))
            .bearer_auth(access_token);
        let institutions: Vec<GoCardlessInstitution> = self.send("institutions", request)?;
        Ok(institutions.into_iter().map(Institution::from).collect())
    }

    fn create_requisition(
        &self,
        access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<Requisition> {
        let builder = self
            .client
            .post(self.url("/requisitions/"))
            .bearer_auth(access_token)
            .json(request);
        self.send("requisitions", builder)
    }
}

// =============================================================================
// Tests
// =============================================================================
