//! Token lifecycle manager
//!
//! Hands out a usable aggregator bearer token. The stored token is reused
//! while it outlives the safety margin; otherwise the manager tries, in
//! order, a refresh and a full re-authentication with the stored secret
//! pair, persisting whatever it obtains.
//!
//! Renewal runs under an in-process mutex. A caller that waited on the
//! mutex re-reads the configuration and reuses a token stored meanwhile.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregatorConfig, RefreshedToken, TokenOutcome, TokenPair, TokenState};
use crate::ports::AggregatorApi;
use crate::services::credentials::CredentialStore;
use crate::services::logging::{events, LogEvent, LoggingService};

/// Renew tokens that expire within this window
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

const INTEGRATION: &str = "gocardless";

pub struct TokenLifecycleManager {
    credentials: CredentialStore,
    api: Arc<dyn AggregatorApi>,
    margin: chrono::Duration,
    renewal: Mutex<()>,
    logger: Option<Arc<LoggingService>>,
}

impl TokenLifecycleManager {
    pub fn new(credentials: CredentialStore, api: Arc<dyn AggregatorApi>) -> Self {
        Self {
            credentials,
            api,
            margin: chrono::Duration::seconds(DEFAULT_SAFETY_MARGIN.as_secs() as i64),
            renewal: Mutex::new(()),
            logger: None,
        }
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.margin = chrono::Duration::seconds(margin.as_secs() as i64);
        self
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// A currently-valid token, or `None` when the integration is unusable
    /// (nothing configured, or both renewal attempts were rejected)
    pub fn get_valid_token(&self) -> Result<Option<String>> {
        match self.resolve() {
            Ok(outcome) => Ok(outcome.into_token()),
            Err(Error::NotConfigured) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve a token and report how it was obtained
    ///
    /// Returns `NotConfigured` when no configuration is stored. Transport
    /// and timeout failures during renewal propagate as errors; only
    /// rejections by the aggregator end in `TokenOutcome::Failed`.
    pub fn resolve(&self) -> Result<TokenOutcome> {
        let config = self.credentials.get()?.ok_or(Error::NotConfigured)?;
        if let Some(token) = self.stored_token(&config) {
            return Ok(TokenOutcome::Valid(token));
        }

        let _guard = self
            .renewal
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))?;

        let config = self.credentials.get()?.ok_or(Error::NotConfigured)?;
        if let Some(token) = self.stored_token(&config) {
            return Ok(TokenOutcome::Valid(token));
        }

        self.renew(config)
    }

    /// Stored access token, if it outlives the safety margin
    fn stored_token(&self, config: &AggregatorConfig) -> Option<String> {
        match config.token_state(Utc::now(), self.margin) {
            TokenState::Valid => config.access_token.clone(),
            TokenState::NearExpiry | TokenState::NoToken => None,
        }
    }

    fn renew(&self, config: AggregatorConfig) -> Result<TokenOutcome> {
        match self.refresh(&config) {
            Ok(refreshed) => {
                let mut renewed = config.clone();
                // An unusable lifetime counts as a rejected refresh
                if renewed.apply_refresh(&refreshed, Utc::now()).is_ok() {
                    if !self.persist(&config, &renewed)? {
                        return self.superseded();
                    }
                    self.log(LogEvent::new(events::TOKEN_REFRESHED));
                    return Ok(TokenOutcome::Refreshed(refreshed.access));
                }
            }
            Err(Error::TokenExpired) => {}
            Err(e) => return Err(e),
        }

        let reason = match self.reauthenticate(&config) {
            Ok(pair) => {
                let mut renewed = config.clone();
                match renewed.apply_token_pair(&pair, Utc::now()) {
                    Ok(()) => {
                        if !self.persist(&config, &renewed)? {
                            return self.superseded();
                        }
                        self.log(LogEvent::new(events::TOKEN_REAUTHENTICATED));
                        return Ok(TokenOutcome::ReAuthenticated(pair.access));
                    }
                    Err(reason) => format!("re-authentication returned {}", reason),
                }
            }
            Err(Error::InvalidCredentials(reason)) => reason,
            Err(e) => return Err(e),
        };

        self.log(LogEvent::new(events::TOKEN_RENEWAL_FAILED).with_error(reason));
        Ok(TokenOutcome::Failed)
    }

    /// Refresh attempt. Any rejection comes back as `TokenExpired`.
    fn refresh(&self, config: &AggregatorConfig) -> Result<RefreshedToken> {
        let refresh = config
            .usable_refresh_token(Utc::now())
            .ok_or(Error::TokenExpired)?;

        self.api.refresh_token(refresh).map_err(|e| {
            if e.is_retryable() {
                e
            } else {
                Error::TokenExpired
            }
        })
    }

    /// Re-authentication attempt. Any rejection comes back as
    /// `InvalidCredentials`.
    fn reauthenticate(&self, config: &AggregatorConfig) -> Result<TokenPair> {
        if !config.has_credentials() {
            return Err(Error::InvalidCredentials(
                "no secret pair stored".to_string(),
            ));
        }

        self.api
            .new_token(&config.secret_id, &config.secret_key)
            .map_err(|e| match e {
                e if e.is_retryable() => e,
                Error::Upstream { status, .. } => Error::InvalidCredentials(format!(
                    "re-authentication rejected (HTTP {})",
                    status
                )),
                other => Error::InvalidCredentials(format!("re-authentication failed: {}", other)),
            })
    }

    /// Write the renewed token fields onto the current record. Returns
    /// false without writing when the record was removed or its secret
    /// pair replaced since `used` was read.
    fn persist(&self, used: &AggregatorConfig, renewed: &AggregatorConfig) -> Result<bool> {
        let mut current = match self.credentials.get()? {
            Some(current) if current.same_credentials(used) => current,
            _ => return Ok(false),
        };
        current.copy_tokens_from(renewed);
        self.credentials.update(&current.id, &current)?;
        Ok(true)
    }

    /// Outcome when a renewal lost to a concurrent save or removal
    fn superseded(&self) -> Result<TokenOutcome> {
        let config = self.credentials.get()?.ok_or(Error::NotConfigured)?;
        Ok(self
            .stored_token(&config)
            .map_or(TokenOutcome::Failed, TokenOutcome::Valid))
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event.with_integration(INTEGRATION));
        }
    }
}
