//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod configuration;
pub mod connections;
pub mod credentials;
pub mod logging;
pub mod migration;
mod provider;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use configuration::ConfigurationService;
pub use connections::{
    CascadeDeleteReport, ConnectionService, OrphanedTransaction, PurgeReport,
};
pub use credentials::{CredentialStore, CredentialValidator};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use provider::{GoCardlessProvider, StartedConnection, GOCARDLESS_PROVIDER};
pub use token::TokenLifecycleManager;
