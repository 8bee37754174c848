//! Repository Pattern for the catalog and measurement store
//!
//! This module provides trait-based repository abstractions so the batch
//! orchestrator can run against SQLite in production and against an in-memory
//! mock (with fault injection) in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Batch Orchestrator                      │
//! │            (synchronizer, prober, summary)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           CatalogStore::begin → CatalogTransaction          │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                         │
//!                    ▼                         ▼
//!          ┌─────────────────┐       ┌─────────────────┐
//!          │     SQLite      │       │      Mock       │
//!          │  Implementation │       │ Implementation  │
//!          └─────────────────┘       └─────────────────┘
//! ```
//!
//! Every write happens inside a transaction handle. Dropping a handle without
//! calling [`CatalogTransaction::commit`] discards its writes.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::models::{CatalogEntry, Measurement, SelectionFilter};
use crate::utils::error::StorageError;

type StoreResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Repository Traits
// ============================================================================

/// Catalog and measurement operations scoped to one transaction
pub trait CatalogTransaction {
    /// Look up a catalog entry by world id
    fn find_catalog_entry(&self, numeric_id: i64) -> StoreResult<Option<CatalogEntry>>;

    /// Look up a catalog entry by probe url
    fn find_catalog_entry_by_url(&self, url: &str) -> StoreResult<Option<CatalogEntry>>;

    /// Insert new catalog entries, returning how many were written
    fn insert_catalog_entries(&mut self, batch: &[CatalogEntry]) -> StoreResult<usize>;

    /// All catalog entries matching the selection predicate, ordered by world id
    fn query_catalog_entries(&self, filter: &SelectionFilter) -> StoreResult<Vec<CatalogEntry>>;

    /// Append measurements, returning how many were written
    fn insert_measurements(&mut self, batch: &[Measurement]) -> StoreResult<usize>;

    /// Make every write of this transaction durable
    fn commit(self) -> StoreResult<()>
    where
        Self: Sized;

    /// Discard every write of this transaction
    fn rollback(self) -> StoreResult<()>
    where
        Self: Sized;
}

/// A store that hands out scoped transactions
pub trait CatalogStore {
    type Transaction<'a>: CatalogTransaction
    where
        Self: 'a;

    /// Open a new transaction
    fn begin(&mut self) -> StoreResult<Self::Transaction<'_>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const CATALOG_COLUMNS: &str = "numeric_id, name, url, location, is_members, activity";

/// SQLite implementation of CatalogStore
pub struct SqliteCatalogStore {
    conn: Connection,
}

impl SqliteCatalogStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::with_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    /// Create database schema
    fn create_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS catalog (
                    pkey INTEGER PRIMARY KEY AUTOINCREMENT,
                    numeric_id INTEGER NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    url TEXT NOT NULL UNIQUE,
                    location TEXT NOT NULL,
                    is_members INTEGER NOT NULL,
                    activity TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS measurements (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    endpoint_id INTEGER NOT NULL REFERENCES catalog(numeric_id),
                    timestamp TEXT NOT NULL,
                    latency_seconds REAL NOT NULL,
                    player_count INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_measurements_endpoint
                    ON measurements(endpoint_id);
                "#,
        )?;

        Ok(())
    }

    /// Number of catalog rows
    pub fn catalog_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of measurement rows
    pub fn measurement_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All catalog rows ordered by world id
    pub fn catalog_entries(&self) -> StoreResult<Vec<CatalogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CATALOG_COLUMNS} FROM catalog ORDER BY numeric_id"))?;
        let entries = stmt
            .query_map([], catalog_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Measurements recorded for one world, oldest first
    pub fn measurements_for(&self, numeric_id: i64) -> StoreResult<Vec<Measurement>> {
        let mut stmt = self.conn.prepare(
            "SELECT endpoint_id, timestamp, latency_seconds, player_count
             FROM measurements WHERE endpoint_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![numeric_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(endpoint_id, timestamp, latency_seconds, player_count)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| StorageError::CorruptRow(format!("timestamp '{timestamp}': {e}")))?;
                Ok(Measurement {
                    endpoint_id,
                    timestamp,
                    latency_seconds,
                    player_count: u32::try_from(player_count).unwrap_or(0),
                })
            })
            .collect()
    }
}

impl CatalogStore for SqliteCatalogStore {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn begin(&mut self) -> StoreResult<SqliteTransaction<'_>> {
        Ok(SqliteTransaction {
            tx: self.conn.transaction()?,
        })
    }
}

/// Open SQLite transaction; rolls back on drop unless committed
pub struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        numeric_id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        location: row.get(3)?,
        is_members: row.get(4)?,
        activity: row.get(5)?,
    })
}

impl CatalogTransaction for SqliteTransaction<'_> {
    fn find_catalog_entry(&self, numeric_id: i64) -> StoreResult<Option<CatalogEntry>> {
        let entry = self
            .tx
            .query_row(
                &format!("SELECT {CATALOG_COLUMNS} FROM catalog WHERE numeric_id = ?1"),
                params![numeric_id],
                catalog_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn find_catalog_entry_by_url(&self, url: &str) -> StoreResult<Option<CatalogEntry>> {
        let entry = self
            .tx
            .query_row(
                &format!("SELECT {CATALOG_COLUMNS} FROM catalog WHERE url = ?1"),
                params![url],
                catalog_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn insert_catalog_entries(&mut self, batch: &[CatalogEntry]) -> StoreResult<usize> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "INSERT INTO catalog ({CATALOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))?;
        for entry in batch {
            stmt.execute(params![
                entry.numeric_id,
                entry.name,
                entry.url,
                entry.location,
                entry.is_members,
                entry.activity,
            ])?;
        }
        Ok(batch.len())
    }

    fn query_catalog_entries(&self, filter: &SelectionFilter) -> StoreResult<Vec<CatalogEntry>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if filter.members_only {
            clauses.push("is_members = 1".to_string());
        }
        if !filter.locations.is_empty() {
            let placeholders = vec!["?"; filter.locations.len()].join(",");
            clauses.push(format!("location IN ({placeholders})"));
            values.extend(filter.locations.iter().cloned().map(Value::Text));
        }
        if let Some(activity) = &filter.activity {
            clauses.push("activity = ?".to_string());
            values.push(Value::Text(activity.clone()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let query = format!("SELECT {CATALOG_COLUMNS} FROM catalog{where_clause} ORDER BY numeric_id");

        let mut stmt = self.tx.prepare(&query)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), catalog_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn insert_measurements(&mut self, batch: &[Measurement]) -> StoreResult<usize> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO measurements (endpoint_id, timestamp, latency_seconds, player_count)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for m in batch {
            stmt.execute(params![
                m.endpoint_id,
                m.timestamp.to_rfc3339(),
                m.latency_seconds,
                m.player_count,
            ])?;
        }
        Ok(batch.len())
    }

    fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .map_err(|e| StorageError::CommitFailed(e.to_string()))
    }

    fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MockState {
    catalog: BTreeMap<i64, CatalogEntry>,
    measurements: Vec<Measurement>,
}

/// Faults a [`MockCatalogStore`] injects into its transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFaults {
    /// `commit` fails after all writes were staged
    pub fail_on_commit: bool,

    /// `insert_measurements` fails
    pub fail_on_measurement_insert: bool,

    /// `query_catalog_entries` fails
    pub fail_on_query: bool,
}

/// In-memory mock implementation of CatalogStore
///
/// Mirrors the SQLite constraints (unique id and url, measurement foreign
/// key) and can inject faults to exercise rollback paths.
#[derive(Debug, Default)]
pub struct MockCatalogStore {
    state: MockState,
    faults: MockFaults,
    commits: usize,
    rollbacks: usize,
}

impl MockCatalogStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store that injects the given faults
    pub fn with_faults(faults: MockFaults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    /// Replace the injected faults
    pub fn set_faults(&mut self, faults: MockFaults) {
        self.faults = faults;
    }

    /// Committed catalog entries ordered by world id
    pub fn catalog_entries(&self) -> Vec<CatalogEntry> {
        self.state.catalog.values().cloned().collect()
    }

    /// Committed measurements in insertion order
    pub fn measurements(&self) -> &[Measurement] {
        &self.state.measurements
    }

    /// Number of successful commits
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Number of explicit rollbacks
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }
}

impl CatalogStore for MockCatalogStore {
    type Transaction<'a> = MockTransaction<'a>;

    fn begin(&mut self) -> StoreResult<MockTransaction<'_>> {
        let staged = self.state.clone();
        Ok(MockTransaction {
            store: self,
            staged,
        })
    }
}

/// Mock transaction working on a staged copy of the store state
pub struct MockTransaction<'a> {
    store: &'a mut MockCatalogStore,
    staged: MockState,
}

impl CatalogTransaction for MockTransaction<'_> {
    fn find_catalog_entry(&self, numeric_id: i64) -> StoreResult<Option<CatalogEntry>> {
        Ok(self.staged.catalog.get(&numeric_id).cloned())
    }

    fn find_catalog_entry_by_url(&self, url: &str) -> StoreResult<Option<CatalogEntry>> {
        Ok(self.staged.catalog.values().find(|e| e.url == url).cloned())
    }

    fn insert_catalog_entries(&mut self, batch: &[CatalogEntry]) -> StoreResult<usize> {
        for entry in batch {
            if self.staged.catalog.contains_key(&entry.numeric_id) {
                return Err(StorageError::WriteRejected(format!(
                    "duplicate world id {}",
                    entry.numeric_id
                )));
            }
            if self.staged.catalog.values().any(|e| e.url == entry.url) {
                return Err(StorageError::WriteRejected(format!(
                    "duplicate url {}",
                    entry.url
                )));
            }
            self.staged.catalog.insert(entry.numeric_id, entry.clone());
        }
        Ok(batch.len())
    }

    fn query_catalog_entries(&self, filter: &SelectionFilter) -> StoreResult<Vec<CatalogEntry>> {
        if self.store.faults.fail_on_query {
            return Err(StorageError::WriteRejected("injected query fault".to_string()));
        }
        Ok(self
            .staged
            .catalog
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn insert_measurements(&mut self, batch: &[Measurement]) -> StoreResult<usize> {
        if self.store.faults.fail_on_measurement_insert {
            return Err(StorageError::WriteRejected(
                "injected measurement fault".to_string(),
            ));
        }
        if let Some(orphan) = batch
            .iter()
            .find(|m| !self.staged.catalog.contains_key(&m.endpoint_id))
        {
            return Err(StorageError::WriteRejected(format!(
                "measurement references unknown world {}",
                orphan.endpoint_id
            )));
        }
        self.staged.measurements.extend_from_slice(batch);
        Ok(batch.len())
    }

    fn commit(self) -> StoreResult<()> {
        if self.store.faults.fail_on_commit {
            return Err(StorageError::CommitFailed("injected commit fault".to_string()));
        }
        self.store.state = self.staged;
        self.store.commits += 1;
        Ok(())
    }

    fn rollback(self) -> StoreResult<()> {
        self.store.rollbacks += 1;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
