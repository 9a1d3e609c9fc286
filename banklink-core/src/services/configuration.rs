//! Configuration service - save, inspect and remove aggregator credentials

use std::sync::Arc;

use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregatorConfig, ConfigurationStatus};
use crate::services::credentials::{CredentialStore, CredentialValidator};
use crate::services::logging::{events, LogEvent, LoggingService};

const INTEGRATION: &str = "gocardless";

pub struct ConfigurationService {
    credentials: CredentialStore,
    validator: CredentialValidator,
    logger: Option<Arc<LoggingService>>,
}

impl ConfigurationService {
    pub fn new(credentials: CredentialStore, validator: CredentialValidator) -> Self {
        Self {
            credentials,
            validator,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn status(&self) -> Result<ConfigurationStatus> {
        let config = self.credentials.get()?;
        Ok(ConfigurationStatus::from_config(config.as_ref()))
    }

    /// Validate the secret pair with the aggregator and store it together
    /// with the issued tokens. Nothing is written if validation fails.
    pub fn save(&self, secret_id: &str, secret_key: &str) -> Result<ConfigurationStatus> {
        let pair = self.validator.validate(secret_id, secret_key)?;
        let config =
            AggregatorConfig::from_validated(secret_id.trim(), secret_key.trim(), &pair, Utc::now())
                .map_err(|reason| Error::Upstream {
                    status: 200,
                    body: format!("token/new: {}", reason),
                })?;
        let saved = self.credentials.save(&config)?;

        self.log(LogEvent::new(events::CONFIGURATION_SAVED));
        Ok(ConfigurationStatus::from_config(Some(&saved)))
    }

    /// Remove the stored configuration. Returns whether anything was removed.
    pub fn remove(&self) -> Result<bool> {
        let Some(existing) = self.credentials.get()? else {
            return Ok(false);
        };
        self.credentials.delete(&existing.id)?;

        self.log(LogEvent::new(events::CONFIGURATION_REMOVED));
        Ok(true)
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event.with_integration(INTEGRATION));
        }
    }
}
