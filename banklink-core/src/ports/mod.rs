//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod aggregator;
mod provider;
pub mod record_store;

pub use aggregator::AggregatorApi;
pub use provider::{InstitutionCatalog, TokenProvider};
pub use record_store::{
    encode_fields, Collection, Filter, ListQuery, Record, RecordPage, RecordStore, SortOrder,
};
