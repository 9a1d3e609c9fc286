//! Record store port - generic persistence over named collections

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};

/// Collections the core reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Singleton aggregator configuration
    AggregatorConfig,
    BankConnections,
    BankTransactions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::AggregatorConfig => "aggregator_config",
            Collection::BankConnections => "bank_connections",
            Collection::BankTransactions => "bank_transactions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored record: store-managed metadata plus a JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Object holding the record's own fields (never id/createdAt/updatedAt)
    pub data: JsonValue,
}

/// Keys the store owns; stripped from payloads before writing
const META_KEYS: [&str; 3] = ["id", "createdAt", "updatedAt"];

impl Record {
    /// Deserialize into a domain type, exposing store metadata as
    /// `id`, `createdAt` and `updatedAt`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut value = match &self.data {
            JsonValue::Object(map) => JsonValue::Object(map.clone()),
            _ => JsonValue::Object(serde_json::Map::new()),
        };
        if let JsonValue::Object(map) = &mut value {
            map.insert("id".to_string(), JsonValue::String(self.id.clone()));
            map.insert(
                "createdAt".to_string(),
                serde_json::to_value(self.created_at)?,
            );
            map.insert(
                "updatedAt".to_string(),
                serde_json::to_value(self.updated_at)?,
            );
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Serialize a domain value into a record payload (store metadata removed)
pub fn encode_fields<T: Serialize>(value: &T) -> Result<JsonValue> {
    let mut json = serde_json::to_value(value)?;
    match &mut json {
        JsonValue::Object(map) => {
            for key in META_KEYS {
                map.remove(key);
            }
        }
        _ => return Err(Error::validation("record payload must be a JSON object")),
    }
    Ok(json)
}

/// Equality filter on a top-level payload field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field names are plain identifiers (they end up in a JSON path)
    pub fn validate(&self) -> Result<()> {
        let valid = !self.field.is_empty()
            && self
                .field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "invalid filter field: {:?}",
                self.field
            )))
        }
    }

    pub fn matches(&self, data: &JsonValue) -> bool {
        match data.get(&self.field) {
            Some(JsonValue::String(s)) => *s == self.value,
            Some(JsonValue::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// One page of a filtered listing. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<Filter>,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl ListQuery {
    pub fn new(per_page: u32) -> Self {
        Self {
            filter: None,
            sort: SortOrder::NewestFirst,
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub(crate) fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// Result of a paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    pub items: Vec<Record>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl RecordPage {
    pub fn new(items: Vec<Record>, query: &ListQuery, total_items: u64) -> Self {
        let per_page = u64::from(query.per_page.max(1));
        let total_pages = total_items.div_ceil(per_page) as u32;
        Self {
            items,
            page: query.page,
            per_page: query.per_page,
            total_items,
            total_pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Generic record store
///
/// The store offers single-record operations only; there is no
/// multi-record transaction. Implementations must apply their own call
/// timeout and report it as `Error::Timeout`.
pub trait RecordStore: Send + Sync {
    /// List one page of records
    fn list(&self, collection: Collection, query: &ListQuery) -> Result<RecordPage>;

    /// Fetch a record by id
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>>;

    /// Create a record; the store assigns an id unless one is given
    fn create(&self, collection: Collection, id: Option<&str>, data: &JsonValue) -> Result<Record>;

    /// Replace a record's payload
    fn update(&self, collection: Collection, id: &str, data: &JsonValue) -> Result<Record>;

    /// Delete a record. Deleting a missing record is `Error::NotFound`.
    fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}
