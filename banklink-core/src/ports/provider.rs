//! Provider capability ports
//!
//! Consumers depend on these traits only, so a provider can be swapped by
//! configuration without touching them.

use crate::domain::result::Result;
use crate::domain::Institution;

/// Supplies a bearer token for aggregator calls
pub trait TokenProvider: Send + Sync {
    /// Provider name (e.g., "gocardless", "secondary")
    fn name(&self) -> &str;

    /// A currently-valid token, or `None` when the integration is unusable
    /// (not configured, or credentials need re-entering)
    fn valid_token(&self) -> Result<Option<String>>;
}

/// Lists the banks a provider can connect to
pub trait InstitutionCatalog: Send + Sync {
    /// Institutions for an ISO 3166 country code, sorted ascending by name
    fn list_institutions(&self, country: &str) -> Result<Vec<Institution>>;
}
