//! In-memory record store
//!
//! Test support for the service unit tests. Records every call it receives and can be told
//! to fail specific deletes or all updates, which is how partial cascades
//! and failed token persistence are exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::ports::{Collection, ListQuery, Record, RecordPage, RecordStore, SortOrder};

/// A call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(Collection),
    Get(Collection, String),
    Create(Collection, String),
    Update(Collection, String),
    Delete(Collection, String),
}

#[derive(Default)]
struct MemoryState {
    /// Records per collection in insertion order
    records: HashMap<Collection, Vec<Record>>,
    calls: Vec<StoreCall>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_updates: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))
    }

    /// Make every delete of `id` (in any collection) fail
    pub fn fail_deletes_of(&self, id: impl Into<String>) {
        if let Ok(mut failing) = self.failing_deletes.lock() {
            failing.insert(id.into());
        }
    }

    /// Stop failing deletes of `id`
    pub fn heal_deletes_of(&self, id: &str) {
        if let Ok(mut failing) = self.failing_deletes.lock() {
            failing.remove(id);
        }
    }

    /// Make every update fail
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// All calls seen so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Ids passed to `delete` for a collection, in call order
    pub fn delete_attempts(&self, collection: Collection) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete(c, id) if c == collection => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Number of write calls (create/update/delete) seen so far
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    StoreCall::Create(..) | StoreCall::Update(..) | StoreCall::Delete(..)
                )
            })
            .count()
    }

    /// Number of records currently held in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.state()
            .map(|s| s.records.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl RecordStore for MemoryRecordStore {
    fn list(&self, collection: Collection, query: &ListQuery) -> Result<RecordPage> {
        if let Some(filter) = &query.filter {
            filter.validate()?;
        }
        let mut state = self.state()?;
        state.calls.push(StoreCall::List(collection));

        let mut matching: Vec<Record> = state
            .records
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.filter.as_ref().map_or(true, |f| f.matches(&r.data)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if query.sort == SortOrder::NewestFirst {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();
        Ok(RecordPage::new(items, query, total))
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let mut state = self.state()?;
        state.calls.push(StoreCall::Get(collection, id.to_string()));
        Ok(state
            .records
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned())
    }

    fn create(&self, collection: Collection, id: Option<&str>, data: &JsonValue) -> Result<Record> {
        if !data.is_object() {
            return Err(Error::validation("record payload must be a JSON object"));
        }
        let record_id = match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().simple().to_string(),
        };

        let mut state = self.state()?;
        state
            .calls
            .push(StoreCall::Create(collection, record_id.clone()));

        let records = state.records.entry(collection).or_default();
        if records.iter().any(|r| r.id == record_id) {
            return Err(Error::validation(format!(
                "{} record {} already exists",
                collection, record_id
            )));
        }

        let now = Utc::now();
        let record = Record {
            id: record_id,
            created_at: now,
            updated_at: now,
            data: data.clone(),
        };
        records.push(record.clone());
        Ok(record)
    }

    fn update(&self, collection: Collection, id: &str, data: &JsonValue) -> Result<Record> {
        if !data.is_object() {
            return Err(Error::validation("record payload must be a JSON object"));
        }
        let mut state = self.state()?;
        state.calls.push(StoreCall::Update(collection, id.to_string()));

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::store(format!("update of {} {} failed", collection, id)));
        }

        let record = state
            .records
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| Error::not_found(format!("{} record {}", collection, id)))?;
        record.data = data.clone();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut state = self.state()?;
        state.calls.push(StoreCall::Delete(collection, id.to_string()));

        let failing = self
            .failing_deletes
            .lock()
            .map(|f| f.contains(id))
            .unwrap_or(false);
        if failing {
            return Err(Error::store(format!("delete of {} {} failed", collection, id)));
        }

        let records = state.records.entry(collection).or_default();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::not_found(format!("{} record {}", collection, id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Filter;
    use serde_json::json;

    #[test]
    fn test_crud_round() {
        let store = MemoryRecordStore::new();
        let created = store
            .create(Collection::BankConnections, Some("c1"), &json!({"provider": "gocardless"}))
            .unwrap();
        assert_eq!(created.id, "c1");

        let updated = store
            .update(Collection::BankConnections, "c1", &json!({"provider": "secondary"}))
            .unwrap();
        assert_eq!(updated.data["provider"], "secondary");

        store.delete(Collection::BankConnections, "c1").unwrap();
        assert_eq!(store.len(Collection::BankConnections), 0);
        assert!(matches!(
            store.delete(Collection::BankConnections, "c1"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filter_and_order() {
        let store = MemoryRecordStore::new();
        for (id, conn) in [("t1", "c1"), ("t2", "c2"), ("t3", "c1")] {
            store
                .create(
                    Collection::BankTransactions,
                    Some(id),
                    &json!({"bankConnectionId": conn}),
                )
                .unwrap();
        }

        let page = store
            .list(
                Collection::BankTransactions,
                &ListQuery::new(10).filter(Filter::eq("bankConnectionId", "c1")),
            )
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1"]);
    }

    #[test]
    fn test_injected_delete_failure_is_recorded() {
        let store = MemoryRecordStore::new();
        store
            .create(Collection::BankTransactions, Some("t1"), &json!({}))
            .unwrap();
        store.fail_deletes_of("t1");

        assert!(matches!(
            store.delete(Collection::BankTransactions, "t1"),
            Err(Error::Store(_))
        ));
        assert_eq!(store.delete_attempts(Collection::BankTransactions), vec!["t1"]);
        assert_eq!(store.len(Collection::BankTransactions), 1);

        store.heal_deletes_of("t1");
        store.delete(Collection::BankTransactions, "t1").unwrap();
    }

    #[test]
    fn test_injected_update_failure() {
        let store = MemoryRecordStore::new();
        store
            .create(Collection::AggregatorConfig, Some("cfg"), &json!({"a": 1}))
            .unwrap();
        store.fail_updates(true);
        assert!(store
            .update(Collection::AggregatorConfig, "cfg", &json!({"a": 2}))
            .is_err());
        let record = store.get(Collection::AggregatorConfig, "cfg").unwrap().unwrap();
        assert_eq!(record.data["a"], 1);
    }
}
