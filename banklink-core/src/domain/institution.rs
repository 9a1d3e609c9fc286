//! Institution and requisition models
//!
//! Institutions are fetched live per request and never persisted.

use icu_collator::{Collator, CollatorOptions, Strength};
use serde::{Deserialize, Serialize};

/// A bank supported by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub id: String,
    pub name: String,
    pub bic: Option<String>,
    /// How many days of history the bank exposes
    pub transaction_total_days: Option<u32>,
    pub countries: Vec<String>,
    pub logo: Option<String>,
}

/// Sort institutions ascending by name using root-locale collation.
///
/// Tertiary strength keeps case significant, so names differing only in
/// case keep a fixed order (lowercase first). Equal names keep their
/// input order.
pub fn sort_by_name(institutions: &mut [Institution]) -> Result<(), String> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    let collator = Collator::try_new(&Default::default(), options)
        .map_err(|e| format!("name collator unavailable: {}", e))?;
    institutions.sort_by(|a, b| collator.compare(&a.name, &b.name));
    Ok(())
}

/// Normalize an ISO 3166 alpha-2 country code
pub fn normalize_country(code: &str) -> Result<String, &'static str> {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("country must be a two-letter ISO 3166 code");
    }
    Ok(code.to_ascii_uppercase())
}

/// Body of `POST /requisitions/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequisitionRequest {
    pub institution_id: String,
    pub redirect: String,
    pub reference: String,
}

/// Aggregator-side record of a bank authorisation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: String,
    pub status: String,
    /// URL the user follows to authorise access at their bank
    pub link: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub institution_id: Option<String>,
}
