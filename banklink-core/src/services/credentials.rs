//! Credential store and validator
//!
//! The aggregator configuration is a singleton record in the
//! `aggregator_config` collection. `CredentialStore` hides the record store
//! behind get/create/update/delete/save; `CredentialValidator` checks a
//! candidate secret pair by asking the aggregator for a fresh token.

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregatorConfig, TokenPair};
use crate::ports::{encode_fields, AggregatorApi, Collection, ListQuery, RecordStore};

/// Accessor for the single stored `AggregatorConfig`
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn RecordStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The stored configuration, if any. Reads at most one record.
    pub fn get(&self) -> Result<Option<AggregatorConfig>> {
        let page = self
            .store
            .list(Collection::AggregatorConfig, &ListQuery::new(1))?;
        page.items
            .first()
            .map(|record| record.decode::<AggregatorConfig>())
            .transpose()
    }

    pub fn create(&self, config: &AggregatorConfig) -> Result<AggregatorConfig> {
        let record = self
            .store
            .create(Collection::AggregatorConfig, None, &encode_fields(config)?)?;
        record.decode()
    }

    pub fn update(&self, id: &str, config: &AggregatorConfig) -> Result<AggregatorConfig> {
        let record = self
            .store
            .update(Collection::AggregatorConfig, id, &encode_fields(config)?)?;
        record.decode()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::AggregatorConfig, id)
    }

    /// Upsert against the existing record so a second save never creates
    /// a second configuration
    pub fn save(&self, config: &AggregatorConfig) -> Result<AggregatorConfig> {
        match self.get()? {
            Some(existing) => self.update(&existing.id, config),
            None => self.create(config),
        }
    }
}

/// Checks a secret pair against `POST /token/new/`
#[derive(Clone)]
pub struct CredentialValidator {
    api: Arc<dyn AggregatorApi>,
}

impl CredentialValidator {
    pub fn new(api: Arc<dyn AggregatorApi>) -> Self {
        Self { api }
    }

    /// Obtain a token pair for the candidate secrets. Never persists.
    ///
    /// A non-success answer from the aggregator becomes
    /// `InvalidCredentials`; network failures keep their own kind.
    pub fn validate(&self, secret_id: &str, secret_key: &str) -> Result<TokenPair> {
        if secret_id.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(Error::validation("secret id and secret key are required"));
        }

        self.api
            .new_token(secret_id.trim(), secret_key.trim())
            .map_err(|e| match e {
                Error::Upstream { status, .. } => Error::InvalidCredentials(format!(
                    "aggregator rejected the secret pair (HTTP {})",
                    status
                )),
                other => other,
            })
    }
}
