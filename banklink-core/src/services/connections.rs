//! Connection lifecycle service
//!
//! Lists, creates and deletes bank connections. Deleting a connection
//! removes every transaction that references it first, continuing past
//! individual failures so the caller gets a full account of what was left
//! behind. Leftovers are picked up later by the orphan purge.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::connection::status;
use crate::domain::{BankConnection, NewBankConnection};
use crate::ports::{encode_fields, Collection, Filter, ListQuery, RecordStore, SortOrder};
use crate::services::logging::{events, LogEvent, LoggingService};

pub const DEFAULT_CONNECTION_PAGE_SIZE: u32 = 200;
pub const DEFAULT_TRANSACTION_PAGE_SIZE: u32 = 500;

/// Field on transaction records naming the owning connection
const CONNECTION_REF_FIELD: &str = "bankConnectionId";

/// Outcome of a cascading connection delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeDeleteReport {
    pub connection_id: String,
    pub transactions_found: usize,
    pub transactions_deleted: usize,
    pub failed_transaction_ids: Vec<String>,
}

impl CascadeDeleteReport {
    pub fn transactions_failed(&self) -> usize {
        self.failed_transaction_ids.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_transaction_ids.is_empty()
    }
}

/// A transaction whose connection no longer exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedTransaction {
    pub id: String,
    pub bank_connection_id: String,
}

/// Outcome of an orphan purge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub found: usize,
    pub deleted: usize,
    pub failed_transaction_ids: Vec<String>,
}

pub struct ConnectionService {
    store: Arc<dyn RecordStore>,
    connection_page_size: u32,
    transaction_page_size: u32,
    logger: Option<Arc<LoggingService>>,
}

impl ConnectionService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            connection_page_size: DEFAULT_CONNECTION_PAGE_SIZE,
            transaction_page_size: DEFAULT_TRANSACTION_PAGE_SIZE,
            logger: None,
        }
    }

    pub fn with_page_sizes(mut self, connections: u32, transactions: u32) -> Self {
        self.connection_page_size = connections.max(1);
        self.transaction_page_size = transactions.max(1);
        self
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Newest connections first, at most one page
    pub fn list_connections(&self) -> Result<Vec<BankConnection>> {
        let page = self.store.list(
            Collection::BankConnections,
            &ListQuery::new(self.connection_page_size),
        )?;
        page.items.iter().map(|r| r.decode()).collect()
    }

    pub fn get_connection(&self, id: &str) -> Result<Option<BankConnection>> {
        self.store
            .get(Collection::BankConnections, id)?
            .map(|r| r.decode())
            .transpose()
    }

    pub fn create_connection(&self, mut new: NewBankConnection) -> Result<BankConnection> {
        new.validate().map_err(Error::validation)?;
        if new.status.as_deref().map_or(true, |s| s.trim().is_empty()) {
            new.status = Some(status::CREATED.to_string());
        }

        let record = self
            .store
            .create(Collection::BankConnections, None, &encode_fields(&new)?)?;
        let connection: BankConnection = record.decode()?;

        self.log(
            LogEvent::new(events::CONNECTION_CREATED).with_integration(connection.provider.clone()),
        );
        Ok(connection)
    }

    /// Number of transactions referencing a connection
    pub fn count_transactions(&self, connection_id: &str) -> Result<u64> {
        let page = self.store.list(
            Collection::BankTransactions,
            &ListQuery::new(1).filter(Filter::eq(CONNECTION_REF_FIELD, connection_id)),
        )?;
        Ok(page.total_items)
    }

    /// Delete a connection and every transaction that references it
    ///
    /// Transaction deletes continue past failures. The call succeeds once
    /// the connection record is gone, listing any transaction ids that
    /// could not be removed. If the connection delete itself fails the
    /// result is `PartialDelete`.
    pub fn delete_connection(&self, connection_id: &str) -> Result<CascadeDeleteReport> {
        let connection_id = connection_id.trim();
        if connection_id.is_empty() {
            return Err(Error::validation("connection id is required"));
        }
        let connection = self
            .get_connection(connection_id)?
            .ok_or_else(|| Error::not_found(format!("connection {}", connection_id)))?;

        let transaction_ids = self.transaction_ids_for(connection_id)?;
        let (deleted, failed) = self.delete_transactions(&transaction_ids);

        let report = CascadeDeleteReport {
            connection_id: connection_id.to_string(),
            transactions_found: transaction_ids.len(),
            transactions_deleted: deleted,
            failed_transaction_ids: failed,
        };

        if let Err(e) = self.store.delete(Collection::BankConnections, connection_id) {
            self.log(
                LogEvent::new(events::CASCADE_PARTIAL_FAILURE)
                    .with_integration(connection.provider)
                    .with_error(format!("connection delete failed: {}", e))
                    .with_error_details(format!(
                        "{} of {} transaction deletes failed",
                        report.transactions_failed(),
                        report.transactions_found
                    )),
            );
            return Err(Error::PartialDelete {
                connection_id: report.connection_id,
                failed_transaction_ids: report.failed_transaction_ids,
            });
        }

        if report.is_complete() {
            self.log(
                LogEvent::new(events::CONNECTION_DELETED).with_integration(connection.provider),
            );
        } else {
            self.log(
                LogEvent::new(events::CASCADE_PARTIAL_FAILURE)
                    .with_integration(connection.provider)
                    .with_error(format!(
                        "{} of {} transaction deletes failed",
                        report.transactions_failed(),
                        report.transactions_found
                    )),
            );
        }
        Ok(report)
    }

    /// Transactions whose connection record no longer exists
    pub fn find_orphaned_transactions(&self) -> Result<Vec<OrphanedTransaction>> {
        let connection_ids: HashSet<String> = self
            .all_ids(Collection::BankConnections, None, self.connection_page_size)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        Ok(self
            .all_ids(Collection::BankTransactions, None, self.transaction_page_size)?
            .into_iter()
            .filter_map(|(id, data)| {
                let owner = data
                    .get(CONNECTION_REF_FIELD)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                (!connection_ids.contains(&owner)).then_some(OrphanedTransaction {
                    id,
                    bank_connection_id: owner,
                })
            })
            .collect())
    }

    /// Delete every orphaned transaction, continuing past failures
    pub fn purge_orphaned_transactions(&self) -> Result<PurgeReport> {
        let orphans = self.find_orphaned_transactions()?;
        let ids: Vec<String> = orphans.into_iter().map(|o| o.id).collect();
        let (deleted, failed) = self.delete_transactions(&ids);
        Ok(PurgeReport {
            found: ids.len(),
            deleted,
            failed_transaction_ids: failed,
        })
    }

    /// Every transaction id owned by a connection, paging until exhausted
    fn transaction_ids_for(&self, connection_id: &str) -> Result<Vec<String>> {
        Ok(self
            .all_ids(
                Collection::BankTransactions,
                Some(Filter::eq(CONNECTION_REF_FIELD, connection_id)),
                self.transaction_page_size,
            )?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    fn all_ids(
        &self,
        collection: Collection,
        filter: Option<Filter>,
        per_page: u32,
    ) -> Result<Vec<(String, serde_json::Value)>> {
        let mut ids = Vec::new();
        let mut page_number = 1;
        loop {
            let mut query = ListQuery::new(per_page)
                .sort(SortOrder::OldestFirst)
                .page(page_number);
            if let Some(filter) = &filter {
                query = query.filter(filter.clone());
            }
            let page = self.store.list(collection, &query)?;
            let done = !page.has_more() || page.items.is_empty();
            ids.extend(page.items.into_iter().map(|r| (r.id, r.data)));
            if done {
                return Ok(ids);
            }
            page_number += 1;
        }
    }

    /// Returns (deleted count, failed ids)
    fn delete_transactions(&self, ids: &[String]) -> (usize, Vec<String>) {
        let mut deleted = 0;
        let mut failed = Vec::new();
        for id in ids {
            match self.store.delete(Collection::BankTransactions, id) {
                Ok(()) => deleted += 1,
                Err(_) => failed.push(id.clone()),
            }
        }
        (deleted, failed)
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }
}
