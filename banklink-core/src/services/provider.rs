//! GoCardless provider
//!
//! Combines the token lifecycle manager with the aggregator API to serve
//! institution listings and start new bank connections (requisitions).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::domain::institution::{normalize_country, sort_by_name};
use crate::domain::result::{Error, Result};
use crate::domain::{BankConnection, Institution, NewBankConnection, RequisitionRequest};
use crate::ports::{AggregatorApi, InstitutionCatalog, TokenProvider};
use crate::services::connections::ConnectionService;
use crate::services::logging::{events, LogEvent, LoggingService};
use crate::services::token::TokenLifecycleManager;

pub const GOCARDLESS_PROVIDER: &str = "gocardless";

/// A connection awaiting bank authorisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedConnection {
    pub connection: BankConnection,
    /// URL the user follows to authorise access at their bank
    pub link: String,
}

pub struct GoCardlessProvider {
    tokens: Arc<TokenLifecycleManager>,
    api: Arc<dyn AggregatorApi>,
    logger: Option<Arc<LoggingService>>,
}

impl GoCardlessProvider {
    pub fn new(tokens: Arc<TokenLifecycleManager>, api: Arc<dyn AggregatorApi>) -> Self {
        Self {
            tokens,
            api,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    fn require_token(&self) -> Result<String> {
        self.tokens.get_valid_token()?.ok_or(Error::NotConfigured)
    }

    /// Create a requisition for `institution_id` and record the pending
    /// connection. The returned link sends the user to their bank.
    pub fn start_connection(
        &self,
        connections: &ConnectionService,
        institution_id: &str,
        redirect_url: &str,
    ) -> Result<StartedConnection> {
        let institution_id = institution_id.trim();
        if institution_id.is_empty() {
            return Err(Error::validation("institution id is required"));
        }
        let redirect = Url::parse(redirect_url.trim())
            .map_err(|e| Error::validation(format!("invalid redirect URL: {}", e)))?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(Error::validation("redirect URL must use http or https"));
        }

        let token = self.require_token()?;
        let request = RequisitionRequest {
            institution_id: institution_id.to_string(),
            redirect: redirect.to_string(),
            reference: Uuid::new_v4().to_string(),
        };
        let requisition = self
            .api
            .create_requisition(&token, &request)
            .map_err(|e| self.report(e, "requisitions"))?;

        let connection = connections.create_connection(NewBankConnection {
            provider: GOCARDLESS_PROVIDER.to_string(),
            institution_id: Some(institution_id.to_string()),
            institution_name: None,
            requisition_id: Some(requisition.id),
            reference: Some(request.reference),
            status: Some(requisition.status),
        })?;

        Ok(StartedConnection {
            connection,
            link: requisition.link,
        })
    }

    /// Log an aggregator failure, passing the error through
    fn report(&self, error: Error, endpoint: &str) -> Error {
        if let Some(logger) = &self.logger {
            let _ = logger.log(
                LogEvent::new(events::AGGREGATOR_ERROR)
                    .with_integration(GOCARDLESS_PROVIDER)
                    .with_command(endpoint)
                    .with_error(error.to_string()),
            );
        }
        error
    }
}

impl TokenProvider for GoCardlessProvider {
    fn name(&self) -> &str {
        GOCARDLESS_PROVIDER
    }

    fn valid_token(&self) -> Result<Option<String>> {
        self.tokens.get_valid_token()
    }
}

impl InstitutionCatalog for GoCardlessProvider {
    fn list_institutions(&self, country: &str) -> Result<Vec<Institution>> {
        let country = normalize_country(country).map_err(Error::validation)?;
        let token = self.require_token()?;

        let mut institutions = self
            .api
            .list_institutions(&token, &country)
            .map_err(|e| self.report(e, "institutions"))?;
        sort_by_name(&mut institutions).map_err(Error::Config)?;
        Ok(institutions)
    }
}
