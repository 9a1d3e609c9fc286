//! Banklink Core - open-banking aggregator integration
//!
//! Keeps one set of aggregator credentials usable over time and manages the
//! lifecycle of bank connections and the transactions that depend on them.
//! Laid out as a hexagonal architecture:
//!
//! - **domain**: Core entities (AggregatorConfig, BankConnection, Institution)
//! - **ports**: Trait definitions for external dependencies (RecordStore, AggregatorApi)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, GoCardless, secondary provider)
//! - **api**: Endpoint handlers returning `ApiResponse`

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRecordStore;
use adapters::gocardless::GoCardlessClient;
use adapters::secondary::SecondaryProvider;
use config::{Config, ProviderKind};
use ports::{AggregatorApi, InstitutionCatalog, RecordStore, TokenProvider};
use services::*;

// Re-export commonly used types at crate root
pub use api::{ApiResponse, BanklinkApi};
pub use domain::result::Error;
pub use domain::{
    AggregatorConfig, BankConnection, BankTransaction, ConfigurationStatus, Institution,
    NewBankConnection, TokenOutcome,
};

/// File name of the record store inside the data directory
pub const RECORD_STORE_FILE: &str = "banklink.duckdb";

/// Main context for Banklink operations
///
/// Holds the configuration, the record store and every service, wired
/// for the provider selected in settings.
pub struct BanklinkContext {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub logger: Option<Arc<LoggingService>>,
    pub configuration_service: Arc<ConfigurationService>,
    pub connection_service: Arc<ConnectionService>,
    pub token_manager: Arc<TokenLifecycleManager>,
    pub token_provider: Arc<dyn TokenProvider>,
    pub institution_catalog: Arc<dyn InstitutionCatalog>,
    /// Present when GoCardless is the active provider
    pub gocardless: Option<Arc<GoCardlessProvider>>,
}

impl BanklinkContext {
    /// Open the data directory: settings, record store, log database and
    /// the GoCardless client
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let store = DuckDbRecordStore::new(&data_dir.join(RECORD_STORE_FILE))?
            .with_timeout(config.store_timeout());
        store.ensure_schema()?;

        let base_url = config
            .aggregator
            .base_url
            .clone()
            .unwrap_or_else(adapters::gocardless::get_base_url);
        let client = GoCardlessClient::new_with_base_url(&base_url, config.request_timeout())?;

        // Without a usable log database the context runs unlogged
        let logger = LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION"))
            .ok()
            .map(Arc::new);

        Ok(Self::assemble(config, Arc::new(store), Arc::new(client), logger))
    }

    /// Wire services over an existing store and aggregator transport
    pub fn assemble(
        config: Config,
        store: Arc<dyn RecordStore>,
        api: Arc<dyn AggregatorApi>,
        logger: Option<Arc<LoggingService>>,
    ) -> Self {
        let credentials = CredentialStore::new(Arc::clone(&store));

        let mut configuration_service = ConfigurationService::new(
            credentials.clone(),
            CredentialValidator::new(Arc::clone(&api)),
        );
        let mut connection_service = ConnectionService::new(Arc::clone(&store)).with_page_sizes(
            config.store.connection_page_size,
            config.store.transaction_page_size,
        );
        let mut token_manager = TokenLifecycleManager::new(credentials, Arc::clone(&api))
            .with_safety_margin(config.safety_margin());

        if let Some(logger) = &logger {
            configuration_service = configuration_service.with_logger(Arc::clone(logger));
            connection_service = connection_service.with_logger(Arc::clone(logger));
            token_manager = token_manager.with_logger(Arc::clone(logger));
        }
        let token_manager = Arc::new(token_manager);

        let token_provider: Arc<dyn TokenProvider>;
        let institution_catalog: Arc<dyn InstitutionCatalog>;
        let mut gocardless = None;
        match config.aggregator.provider {
            ProviderKind::Gocardless => {
                let mut provider = GoCardlessProvider::new(Arc::clone(&token_manager), api);
                if let Some(logger) = &logger {
                    provider = provider.with_logger(Arc::clone(logger));
                }
                let provider = Arc::new(provider);
                token_provider = provider.clone();
                institution_catalog = provider.clone();
                gocardless = Some(provider);
            }
            ProviderKind::Secondary => {
                let provider = Arc::new(SecondaryProvider::new(
                    config.secondary.access_token.clone(),
                ));
                token_provider = provider.clone();
                institution_catalog = provider;
            }
        }

        Self {
            config,
            store,
            logger,
            configuration_service: Arc::new(configuration_service),
            connection_service: Arc::new(connection_service),
            token_manager,
            token_provider,
            institution_catalog,
            gocardless,
        }
    }

    /// Endpoint handlers over this context's services
    pub fn api(&self) -> BanklinkApi {
        let api = BanklinkApi::new(
            Arc::clone(&self.configuration_service),
            Arc::clone(&self.connection_service),
            Arc::clone(&self.institution_catalog),
            self.gocardless.clone(),
        );
        match &self.logger {
            Some(logger) => api.with_logger(Arc::clone(logger)),
            None => api,
        }
    }
}
