//! Secondary aggregator provider
//!
//! Partially wired integration: the token comes straight from settings and
//! the institution catalog is empty until the provider's listing API is
//! integrated.

use crate::domain::institution::normalize_country;
use crate::domain::result::{Error, Result};
use crate::domain::Institution;
use crate::ports::{InstitutionCatalog, TokenProvider};

pub const SECONDARY_PROVIDER: &str = "secondary";

#[derive(Default)]
pub struct SecondaryProvider {
    access_token: Option<String>,
}

impl SecondaryProvider {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl TokenProvider for SecondaryProvider {
    fn name(&self) -> &str {
        SECONDARY_PROVIDER
    }

    fn valid_token(&self) -> Result<Option<String>> {
        Ok(self.access_token.clone())
    }
}

impl InstitutionCatalog for SecondaryProvider {
    fn list_institutions(&self, country: &str) -> Result<Vec<Institution>> {
        normalize_country(country).map_err(Error::validation)?;
        if self.access_token.is_none() {
            return Err(Error::NotConfigured);
        }
        Ok(Vec::new())
    }
}
