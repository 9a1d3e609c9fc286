//! Application-facing endpoints
//!
//! Framework-neutral handlers returning `ApiResponse`. A web layer maps
//! `status` onto its HTTP response; the CLI prints `data` or `error`.
//! Faults from the aggregator or the store are logged with full context and
//! surfaced as a generic "integration unavailable" message.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{BankConnection, ConfigurationStatus, Institution};
use crate::ports::InstitutionCatalog;
use crate::services::logging::{events, LogEvent, LoggingService};
use crate::services::{
    CascadeDeleteReport, ConfigurationService, ConnectionService, GoCardlessProvider,
    StartedConnection,
};

const INTEGRATION_UNAVAILABLE: &str = "Bank integration is temporarily unavailable";

/// Cap on aggregator response bodies copied into log details
const MAX_LOGGED_BODY: usize = 512;

/// Result envelope for every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP-equivalent status code
    pub status: u16,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    pub fn fail(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value);
        self
    }
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => error_response(&e),
        }
    }
}

/// Status code for a domain error
pub fn status_for(error: &Error) -> u16 {
    match error {
        Error::NotConfigured => 401,
        Error::InvalidCredentials(_) | Error::Validation(_) => 400,
        Error::NotFound(_) => 404,
        Error::Upstream { .. } => 502,
        Error::Transport(_) => 503,
        Error::Timeout(_) => 504,
        Error::PartialDelete { .. }
        | Error::TokenExpired
        | Error::Store(_)
        | Error::Config(_)
        | Error::Io(_)
        | Error::Json(_) => 500,
    }
}

fn error_response<T>(error: &Error) -> ApiResponse<T> {
    let status = status_for(error);
    match error {
        Error::NotConfigured => ApiResponse::fail(status, "Bank integration is not configured"),
        Error::InvalidCredentials(_) => ApiResponse::fail(status, "Invalid credentials"),
        Error::Validation(msg) => ApiResponse::fail(status, msg.clone()),
        Error::NotFound(what) => ApiResponse::fail(status, format!("Not found: {}", what)),
        Error::PartialDelete {
            connection_id,
            failed_transaction_ids,
        } => ApiResponse::fail(status, error.to_string())
            .with_context("connectionId", serde_json::json!(connection_id))
            .with_context("failedTransactionIds", serde_json::json!(failed_transaction_ids)),
        _ => ApiResponse::fail(status, INTEGRATION_UNAVAILABLE)
            .with_context("retryable", serde_json::json!(error.is_retryable())),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfigurationRequest {
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConnectionRequest {
    #[serde(default)]
    pub institution_id: String,
    #[serde(default)]
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveConfigurationResult {
    pub removed: bool,
}

/// Endpoint handlers over the core services
#[derive(Clone)]
pub struct BanklinkApi {
    configuration: Arc<ConfigurationService>,
    connections: Arc<ConnectionService>,
    catalog: Arc<dyn InstitutionCatalog>,
    gocardless: Option<Arc<GoCardlessProvider>>,
    logger: Option<Arc<LoggingService>>,
}

impl BanklinkApi {
    pub fn new(
        configuration: Arc<ConfigurationService>,
        connections: Arc<ConnectionService>,
        catalog: Arc<dyn InstitutionCatalog>,
        gocardless: Option<Arc<GoCardlessProvider>>,
    ) -> Self {
        Self {
            configuration,
            connections,
            catalog,
            gocardless,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// `GET configuration-status`
    pub fn configuration_status(&self) -> ApiResponse<ConfigurationStatus> {
        self.respond("configuration-status", self.configuration.status())
    }

    /// `POST configuration`
    pub fn save_configuration(
        &self,
        request: &SaveConfigurationRequest,
    ) -> ApiResponse<ConfigurationStatus> {
        self.respond(
            "configuration",
            self.configuration
                .save(&request.secret_id, &request.secret_key),
        )
    }

    /// `DELETE configuration`; succeeds whether or not anything was stored
    pub fn remove_configuration(&self) -> ApiResponse<RemoveConfigurationResult> {
        self.respond(
            "configuration",
            self.configuration
                .remove()
                .map(|removed| RemoveConfigurationResult { removed }),
        )
    }

    /// `GET connections`
    pub fn list_connections(&self) -> ApiResponse<Vec<BankConnection>> {
        self.respond("connections", self.connections.list_connections())
    }

    /// `DELETE connection?id=`
    pub fn delete_connection(&self, id: Option<&str>) -> ApiResponse<CascadeDeleteReport> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return ApiResponse::fail(400, "Missing connection id");
        };
        self.respond("connection", self.connections.delete_connection(id))
    }

    /// `GET institutions?country=`
    pub fn list_institutions(&self, country: Option<&str>) -> ApiResponse<Vec<Institution>> {
        let Some(country) = country else {
            return ApiResponse::fail(400, "Missing country code");
        };
        self.respond("institutions", self.catalog.list_institutions(country))
    }

    /// `POST connection`
    pub fn create_connection(
        &self,
        request: &StartConnectionRequest,
    ) -> ApiResponse<StartedConnection> {
        let Some(gocardless) = &self.gocardless else {
            return ApiResponse::fail(400, "The active provider cannot start bank connections");
        };
        self.respond(
            "connection",
            gocardless.start_connection(
                &self.connections,
                &request.institution_id,
                &request.redirect_url,
            ),
        )
    }

    fn respond<T>(&self, endpoint: &str, result: Result<T>) -> ApiResponse<T> {
        if let Err(e) = &result {
            if status_for(e) >= 500 {
                self.log_fault(endpoint, e);
            }
        }
        result.into()
    }

    fn log_fault(&self, endpoint: &str, error: &Error) {
        let Some(logger) = &self.logger else {
            return;
        };
        let mut event = LogEvent::new(events::AGGREGATOR_ERROR)
            .with_command(endpoint)
            .with_error(error.to_string());
        if let Error::Upstream { body, .. } = error {
            event = event.with_error_details(body.chars().take(MAX_LOGGED_BODY).collect::<String>());
        }
        let _ = logger.log(event);
    }
}
