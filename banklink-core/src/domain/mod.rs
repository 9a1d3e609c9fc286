//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod aggregator_config;
pub mod connection;
pub mod institution;
pub mod result;
mod token;

pub use aggregator_config::{AggregatorConfig, ConfigurationStatus};
pub use connection::{BankConnection, BankTransaction, NewBankConnection};
pub use institution::{Institution, Requisition, RequisitionRequest};
pub use token::{RefreshedToken, TokenOutcome, TokenPair, TokenState};
