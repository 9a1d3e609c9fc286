//! Aggregator configuration domain model

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::token::{RefreshedToken, TokenPair, TokenState};

/// The single stored set of aggregator credentials and tokens
///
/// At most one of these exists. Absence means "not configured".
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorConfig {
    /// Record id assigned by the store (empty until persisted)
    #[serde(default)]
    pub id: String,
    pub secret_id: String,
    pub secret_key: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_configured: bool,
}

impl AggregatorConfig {
    /// Build a configuration from a freshly validated secret pair
    ///
    /// Fails when the pair carries a lifetime that is not positive or does
    /// not fit the calendar.
    pub fn from_validated(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        pair: &TokenPair,
        now: DateTime<Utc>,
    ) -> Result<Self, &'static str> {
        let mut config = Self {
            id: String::new(),
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            refresh_expires_at: None,
            is_configured: true,
        };
        config.apply_token_pair(pair, now)?;
        Ok(config)
    }

    /// Both halves of the secret pair are present
    pub fn has_credentials(&self) -> bool {
        !self.secret_id.trim().is_empty() && !self.secret_key.trim().is_empty()
    }

    /// Classify the stored access token against `now + margin`
    pub fn token_state(&self, now: DateTime<Utc>, margin: Duration) -> TokenState {
        match (&self.access_token, self.token_expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() => {
                if expires_at > now + margin {
                    TokenState::Valid
                } else {
                    TokenState::NearExpiry
                }
            }
            _ => TokenState::NoToken,
        }
    }

    /// Refresh token worth presenting to the aggregator
    ///
    /// `None` when there is no refresh token or its known expiry has passed.
    pub fn usable_refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        match self.refresh_expires_at {
            Some(expires_at) if expires_at <= now => None,
            _ => Some(token),
        }
    }

    /// Store a refreshed access token; keeps the refresh token unless rotated.
    /// Nothing changes when a lifetime is invalid.
    pub fn apply_refresh(
        &mut self,
        refreshed: &RefreshedToken,
        now: DateTime<Utc>,
    ) -> Result<(), &'static str> {
        let expires_at = expiry_after(now, refreshed.access_expires)?;
        let refresh_expires_at = refreshed
            .refresh_expires
            .map(|secs| expiry_after(now, secs))
            .transpose()?;

        self.access_token = Some(refreshed.access.clone());
        self.token_expires_at = Some(expires_at);
        if let Some(refresh) = refreshed.refresh.as_ref().filter(|r| !r.is_empty()) {
            self.refresh_token = Some(refresh.clone());
        }
        if refresh_expires_at.is_some() {
            self.refresh_expires_at = refresh_expires_at;
        }
        Ok(())
    }

    /// Store a brand-new token pair. Nothing changes when a lifetime is invalid.
    pub fn apply_token_pair(
        &mut self,
        pair: &TokenPair,
        now: DateTime<Utc>,
    ) -> Result<(), &'static str> {
        let expires_at = expiry_after(now, pair.access_expires)?;
        let refresh_expires_at = pair
            .refresh_expires
            .map(|secs| expiry_after(now, secs))
            .transpose()?;

        self.access_token = Some(pair.access.clone());
        self.refresh_token = Some(pair.refresh.clone());
        self.token_expires_at = Some(expires_at);
        self.refresh_expires_at = refresh_expires_at;
        Ok(())
    }

    /// Replace this record's tokens with `other`'s, leaving the secret pair alone
    pub fn copy_tokens_from(&mut self, other: &AggregatorConfig) {
        self.access_token = other.access_token.clone();
        self.refresh_token = other.refresh_token.clone();
        self.token_expires_at = other.token_expires_at;
        self.refresh_expires_at = other.refresh_expires_at;
    }

    /// Same record and same secret pair
    pub fn same_credentials(&self, other: &AggregatorConfig) -> bool {
        self.id == other.id && self.secret_id == other.secret_id && self.secret_key == other.secret_key
    }
}

/// `now + secs` for a positive token lifetime
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, &'static str> {
    if secs <= 0 {
        return Err("token lifetime must be positive");
    }
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or("token lifetime out of range")
}

impl fmt::Debug for AggregatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("id", &self.id)
            .field("secret_id", &"***")
            .field("secret_key", &"***")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_expires_at", &self.token_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("is_configured", &self.is_configured)
            .finish()
    }
}

/// Answer to `GET configuration-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    pub is_configured: bool,
    pub has_credentials: bool,
}

impl ConfigurationStatus {
    pub fn from_config(config: Option<&AggregatorConfig>) -> Self {
        match config {
            Some(c) => Self {
                is_configured: c.is_configured,
                has_credentials: c.has_credentials(),
            },
            None => Self {
                is_configured: false,
                has_credentials: false,
            },
        }
    }
}
