//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the RecordStore port
//! - In-memory RecordStore for unit tests
//! - GoCardless HTTP client for the AggregatorApi port
//! - Secondary provider stub for TokenProvider/InstitutionCatalog

pub mod duckdb;
pub mod gocardless;
pub mod secondary;

#[cfg(test)]
pub mod gocardless_mock;
#[cfg(test)]
pub mod memory;
