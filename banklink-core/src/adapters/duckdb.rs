//! DuckDB record store implementation
//!
//! Every collection lives in one `sys_records` table keyed by
//! (collection, record_id) with a JSON payload. Insertion order is tracked
//! by a sequence so "newest first" is stable even for equal timestamps.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Connection, OptionalExt};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::ports::{Collection, ListQuery, Record, RecordPage, RecordStore, SortOrder};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Default time a store call waits for the connection
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest single sleep while waiting for the connection
const MAX_LOCK_BACKOFF: Duration = Duration::from_millis(100);

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB record store
pub struct DuckDbRecordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    timeout: Duration,
}

impl DuckDbRecordStore {
    /// Open (or create) the record store at `db_path`
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when a CLI command and the app open the database at
    /// the same time.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                        timeout: DEFAULT_STORE_TIMEOUT,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[banklink] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::store(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        })
    }

    /// Set how long a call may wait for the connection before timing out
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is linked in via the Cargo feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Acquire the connection, giving up after the configured timeout
    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        let deadline = Instant::now() + self.timeout;
        let mut backoff = Duration::from_millis(5);

        loop {
            match self.conn.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(e)) => {
                    return Err(Error::store(format!("Lock poisoned: {}", e)))
                }
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout(format!(
                            "record store busy for more than {}ms",
                            self.timeout.as_millis()
                        )));
                    }
                    thread::sleep(backoff.min(deadline - now));
                    backoff = (backoff * 2).min(MAX_LOCK_BACKOFF);
                }
            }
        }
    }

    fn fetch(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Record>> {
        let mut stmt = conn.prepare(
            "SELECT record_id, created_at, updated_at, data::VARCHAR
             FROM sys_records
             WHERE collection = ? AND record_id = ?",
        )?;
        let row = stmt
            .query_row(params![collection.as_str(), id], read_row)
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }
}

/// Row as read from DuckDB, before JSON/timestamp parsing
struct RawRecord {
    id: String,
    created_at: String,
    updated_at: String,
    data: String,
}

fn read_row(row: &duckdb::Row) -> duckdb::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        data: row.get(3)?,
    })
}

impl RawRecord {
    fn into_record(self) -> Result<Record> {
        Ok(Record {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            data: serde_json::from_str(&self.data)?,
            id: self.id,
        })
    }
}

impl RecordStore for DuckDbRecordStore {
    fn list(&self, collection: Collection, query: &ListQuery) -> Result<RecordPage> {
        let mut where_clause = "collection = ?".to_string();
        let mut values = vec![collection.as_str().to_string()];
        if let Some(filter) = &query.filter {
            filter.validate()?;
            // Field is a validated identifier, so inlining it into the path is safe
            where_clause.push_str(&format!(
                " AND json_extract_string(data, '$.{}') = ?",
                filter.field
            ));
            values.push(filter.value.clone());
        }

        let order = match query.sort {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };

        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM sys_records WHERE {}", where_clause),
            duckdb::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT record_id, created_at, updated_at, data::VARCHAR
             FROM sys_records
             WHERE {}
             ORDER BY seq {}
             LIMIT {} OFFSET {}",
            where_clause,
            order,
            query.per_page,
            query.offset()
        ))?;

        let rows = stmt
            .query_map(duckdb::params_from_iter(values.iter()), read_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        let items = rows
            .into_iter()
            .map(RawRecord::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordPage::new(items, query, total.max(0) as u64))
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let conn = self.lock()?;
        Self::fetch(&conn, collection, id)
    }

    fn create(&self, collection: Collection, id: Option<&str>, data: &JsonValue) -> Result<Record> {
        if !data.is_object() {
            return Err(Error::validation("record payload must be a JSON object"));
        }
        let record_id = match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().simple().to_string(),
        };
        let now = format_timestamp(Utc::now());

        let conn = self.lock()?;
        if Self::fetch(&conn, collection, &record_id)?.is_some() {
            return Err(Error::validation(format!(
                "{} record {} already exists",
                collection, record_id
            )));
        }

        conn.execute(
            "INSERT INTO sys_records (collection, record_id, created_at, updated_at, data)
             VALUES (?, ?, ?, ?, ?)",
            params![
                collection.as_str(),
                record_id,
                now,
                now,
                serde_json::to_string(data)?
            ],
        )?;

        Self::fetch(&conn, collection, &record_id)?
            .ok_or_else(|| Error::store(format!("{} record {} vanished after insert", collection, record_id)))
    }

    fn update(&self, collection: Collection, id: &str, data: &JsonValue) -> Result<Record> {
        if !data.is_object() {
            return Err(Error::validation("record payload must be a JSON object"));
        }
        let now = format_timestamp(Utc::now());

        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE sys_records SET data = ?, updated_at = ?
             WHERE collection = ? AND record_id = ?",
            params![serde_json::to_string(data)?, now, collection.as_str(), id],
        )?;
        if rows == 0 {
            return Err(Error::not_found(format!("{} record {}", collection, id)));
        }

        Self::fetch(&conn, collection, id)?
            .ok_or_else(|| Error::not_found(format!("{} record {}", collection, id)))
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM sys_records WHERE collection = ? AND record_id = ?",
            params![collection.as_str(), id],
        )?;
        if rows == 0 {
            return Err(Error::not_found(format!("{} record {}", collection, id)));
        }
        Ok(())
    }
}

// Helper functions

/// Fixed-width RFC 3339 so stored strings sort chronologically
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::store(format!("invalid timestamp {:?}: {}", s, e)))
}
