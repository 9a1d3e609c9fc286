//! Aggregator token types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token pair issued by `POST /token/new/`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    /// Lifetime of the access token, in seconds
    pub access_expires: i64,
    pub refresh: String,
    /// Lifetime of the refresh token, in seconds
    #[serde(default)]
    pub refresh_expires: Option<i64>,
}

/// Response of `POST /token/refresh/`
///
/// The refresh token is usually not rotated, so `refresh` is optional.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    pub access_expires: i64,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub refresh_expires: Option<i64>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"***")
            .field("access_expires", &self.access_expires)
            .field("refresh", &"***")
            .field("refresh_expires", &self.refresh_expires)
            .finish()
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access", &"***")
            .field("access_expires", &self.access_expires)
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

/// Where a stored access token sits relative to the safety margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Configured, but no access token (or no expiry) stored yet
    NoToken,
    /// Expires after `now + margin`
    Valid,
    /// Expires at or before `now + margin`
    NearExpiry,
}

/// Result of resolving a usable token
///
/// Each variant corresponds to one of the three sequential attempts:
/// reuse the stored token, refresh it, re-authenticate with the secret pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Valid(String),
    Refreshed(String),
    ReAuthenticated(String),
    /// Neither refresh nor re-authentication produced a usable token
    Failed,
}

impl TokenOutcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Valid(t) | Self::Refreshed(t) | Self::ReAuthenticated(t) => Some(t),
            Self::Failed => None,
        }
    }

    pub fn into_token(self) -> Option<String> {
        match self {
            Self::Valid(t) | Self::Refreshed(t) | Self::ReAuthenticated(t) => Some(t),
            Self::Failed => None,
        }
    }

    /// Short name used in log events
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Refreshed(_) => "refreshed",
            Self::ReAuthenticated(_) => "reauthenticated",
            Self::Failed => "failed",
        }
    }
}
