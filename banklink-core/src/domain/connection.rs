//! Bank connection and transaction domain models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Requisition status codes used by the aggregator
pub mod status {
    pub const CREATED: &str = "CR";
    pub const GIVING_CONSENT: &str = "GC";
    pub const UNDERGOING_AUTHENTICATION: &str = "UA";
    pub const REJECTED: &str = "RJ";
    pub const SELECTING_ACCOUNTS: &str = "SA";
    pub const GRANTING_ACCESS: &str = "GA";
    pub const LINKED: &str = "LN";
    pub const EXPIRED: &str = "EX";
}

/// One linked bank account/session
///
/// Owns every `BankTransaction` whose `bank_connection_id` equals `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankConnection {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Provider name: "gocardless", "secondary"
    pub provider: String,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub institution_name: Option<String>,
    /// Aggregator requisition backing this connection
    #[serde(default)]
    pub requisition_id: Option<String>,
    /// Our reference sent with the requisition
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    status::CREATED.to_string()
}

impl BankConnection {
    pub fn is_linked(&self) -> bool {
        self.status == status::LINKED
    }

    /// Name to show users, falling back to the institution id
    pub fn display_name(&self) -> &str {
        self.institution_name
            .as_deref()
            .or(self.institution_id.as_deref())
            .unwrap_or("Unknown institution")
    }
}

/// Fields for creating a connection record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankConnection {
    pub provider: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    pub requisition_id: Option<String>,
    pub reference: Option<String>,
    pub status: Option<String>,
}

impl NewBankConnection {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Validate before persisting
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.provider.trim().is_empty() {
            return Err("connection provider cannot be empty");
        }
        Ok(())
    }
}

/// A transaction imported through a bank connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Owning connection
    pub bank_connection_id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub booking_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}
