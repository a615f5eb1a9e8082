// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-process multi-version snapshot store
//!
//! Stands in for the remote service in tests and in the CLI. Every commit
//! produces a new table version at a timestamp strictly greater than any read
//! timestamp handed out before it, so snapshots never observe later writes.

mod exec;
pub mod fixture;
pub mod sql;
pub mod table;

pub use fixture::{DatabaseFixture, FixtureSet, TableFixture};
pub use table::{Mutation, TableSchema};

use self::exec::Scope;
use self::sql::{parse_select, SelectQuery, SqlError};
use self::table::{TableData, VersionedTable};
use super::traits::{ReadOnlyTransaction, SnapshotBackend};
use super::types::{BackendSession, BackendType, DatabaseId, ResultSet, Statement, TimestampBound};
use crate::config::{Credentials, Endpoint};
use crate::error::{ScanError, ScanResult};
use crate::partition::{PartitionOptions, PartitionToken};
use crate::types::{ColumnMeta, Row, Value};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What a partition token encodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TokenDescriptor {
    transaction_id: u128,
    index: u32,
    sql: String,
    scope: Scope,
}

#[derive(Debug, Default)]
struct Database {
    tables: HashMap<String, VersionedTable>,
}

#[derive(Debug, Default)]
struct Faults {
    refuse_connections: bool,
    failing_partitions: HashSet<usize>,
}

#[derive(Debug)]
struct Inner {
    databases: RwLock<HashMap<DatabaseId, Database>>,
    clock: Mutex<DateTime<Utc>>,
    sessions: Mutex<HashSet<String>>,
    faults: RwLock<Faults>,
    open_transactions: AtomicUsize,
    partition_executions: AtomicUsize,
}

impl Inner {
    /// Next timestamp, strictly after every timestamp issued so far
    fn tick(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock();
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    fn table_snapshot(
        &self,
        database: &DatabaseId,
        table: &str,
        read_ts: DateTime<Utc>,
    ) -> Result<(TableSchema, TableData), SqlError> {
        let databases = self.databases.read();
        let versioned = databases
            .get(database)
            .and_then(|db| db.tables.get(&table.to_ascii_lowercase()))
            .ok_or_else(|| SqlError::UnknownTable(table.to_string()))?;
        let data = versioned
            .snapshot_at(read_ts)
            .ok_or_else(|| SqlError::UnknownTable(table.to_string()))?;
        Ok((versioned.schema().clone(), data))
    }
}

/// In-process snapshot store
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                databases: RwLock::new(HashMap::new()),
                clock: Mutex::new(DateTime::<Utc>::MIN_UTC),
                sessions: Mutex::new(HashSet::new()),
                faults: RwLock::new(Faults::default()),
                open_transactions: AtomicUsize::new(0),
                partition_executions: AtomicUsize::new(0),
            }),
        }
    }

    /// Build a store seeded from fixtures
    pub fn from_fixtures(fixtures: &FixtureSet) -> ScanResult<Self> {
        let backend = Self::new();
        backend.load_fixtures(fixtures)?;
        Ok(backend)
    }

    /// Create a database; creating an existing one is a no-op
    pub fn create_database(&self, database: &DatabaseId) {
        self.inner
            .databases
            .write()
            .entry(database.clone())
            .or_default();
    }

    pub fn create_table(&self, database: &DatabaseId, schema: TableSchema) -> ScanResult<()> {
        let created_at = self.inner.tick();
        let mut databases = self.inner.databases.write();
        let db = databases
            .get_mut(database)
            .ok_or_else(|| ScanError::Storage(format!("Database not found: {}", database)))?;

        let key = schema.name.to_ascii_lowercase();
        if db.tables.contains_key(&key) {
            return Err(ScanError::Storage(format!(
                "Table {} already exists in {}",
                schema.name, database
            )));
        }
        db.tables.insert(key, VersionedTable::new(schema, created_at));
        Ok(())
    }

    /// Apply mutations to one table as a single commit
    pub fn commit(
        &self,
        database: &DatabaseId,
        table: &str,
        mutations: Vec<Mutation>,
    ) -> ScanResult<DateTime<Utc>> {
        let commit_ts = self.inner.tick();
        let mut databases = self.inner.databases.write();
        let versioned = databases
            .get_mut(database)
            .and_then(|db| db.tables.get_mut(&table.to_ascii_lowercase()))
            .ok_or_else(|| {
                ScanError::Storage(format!("Table {} not found in {}", table, database))
            })?;
        versioned.commit(commit_ts, mutations)?;
        log::debug!("Committed to {}.{} at {}", database, table, commit_ts);
        Ok(commit_ts)
    }

    /// Insert or replace rows
    pub fn upsert(
        &self,
        database: &DatabaseId,
        table: &str,
        rows: Vec<Row>,
    ) -> ScanResult<DateTime<Utc>> {
        self.commit(database, table, rows.into_iter().map(Mutation::Upsert).collect())
    }

    pub fn delete(
        &self,
        database: &DatabaseId,
        table: &str,
        keys: Vec<Value>,
    ) -> ScanResult<DateTime<Utc>> {
        self.commit(database, table, keys.into_iter().map(Mutation::Delete).collect())
    }

    /// Replace the explicit partition boundaries of a table
    pub fn set_split_points(
        &self,
        database: &DatabaseId,
        table: &str,
        split_points: Vec<Value>,
    ) -> ScanResult<()> {
        let mut databases = self.inner.databases.write();
        let versioned = databases
            .get_mut(database)
            .and_then(|db| db.tables.get_mut(&table.to_ascii_lowercase()))
            .ok_or_else(|| {
                ScanError::Storage(format!("Table {} not found in {}", table, database))
            })?;
        versioned.set_split_points(split_points);
        Ok(())
    }

    pub fn load_fixtures(&self, fixtures: &FixtureSet) -> ScanResult<()> {
        for db in &fixtures.databases {
            let database = db.database();
            self.create_database(&database);
            for table in &db.tables {
                self.create_table(&database, table.schema()?)?;
                let rows = table.native_rows()?;
                if !rows.is_empty() {
                    self.upsert(&database, &table.name, rows)?;
                }
            }
            log::info!("Loaded {} tables into {}", db.tables.len(), database);
        }
        Ok(())
    }

    /// Refuse new sessions until cleared
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.faults.write().refuse_connections = refuse;
    }

    /// Make every execution of the partition at `index` fail
    pub fn fail_partition(&self, index: usize) {
        self.inner.faults.write().failing_partitions.insert(index);
    }

    pub fn clear_faults(&self) {
        *self.inner.faults.write() = Faults::default();
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn open_transactions(&self) -> usize {
        self.inner.open_transactions.load(Ordering::Acquire)
    }

    /// Number of partition executions served so far
    pub fn partition_executions(&self) -> usize {
        self.inner.partition_executions.load(Ordering::Acquire)
    }
}

impl SnapshotBackend for MemoryBackend {
    fn create_session(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> ScanResult<BackendSession> {
        if self.inner.faults.read().refuse_connections {
            return Err(ScanError::Connection(format!(
                "Connection refused by {}",
                endpoint
            )));
        }

        let id = Uuid::new_v4().to_string();
        self.inner.sessions.lock().insert(id.clone());
        Ok(BackendSession {
            id,
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
        })
    }

    fn begin_read_only(
        &self,
        session: &BackendSession,
        database: &DatabaseId,
        bound: TimestampBound,
    ) -> ScanResult<Box<dyn ReadOnlyTransaction>> {
        if !self.inner.sessions.lock().contains(&session.id) {
            return Err(ScanError::Connection(format!(
                "Session {} is not active",
                session.id
            )));
        }
        if !self.inner.databases.read().contains_key(database) {
            return Err(ScanError::Connection(format!(
                "Database not found: {}",
                database
            )));
        }

        // Every read timestamp is at or below the clock, so later commits land after it
        let now = self.inner.tick();
        let read_ts = match bound {
            TimestampBound::Strong => now,
            TimestampBound::ReadTimestamp(ts) => {
                if ts > now {
                    return Err(ScanError::Configuration(format!(
                        "Read timestamp {} is in the future",
                        ts.to_rfc3339()
                    )));
                }
                ts
            }
            TimestampBound::ExactStaleness(staleness) => Duration::from_std(staleness)
                .ok()
                .and_then(|staleness| now.checked_sub_signed(staleness))
                .ok_or_else(|| {
                    ScanError::Configuration(format!("Invalid staleness: {:?}", staleness))
                })?,
        };

        self.inner.open_transactions.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryTransaction {
            id: Uuid::new_v4(),
            inner: Arc::clone(&self.inner),
            database: database.clone(),
            read_ts,
            closed: AtomicBool::new(false),
        }))
    }

    fn release_session(&self, session: &BackendSession) {
        self.inner.sessions.lock().remove(&session.id);
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}

/// Read-only transaction pinned to one read timestamp
struct MemoryTransaction {
    id: Uuid,
    inner: Arc<Inner>,
    database: DatabaseId,
    read_ts: DateTime<Utc>,
    closed: AtomicBool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> ScanResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(ScanError::Closed)
        } else {
            Ok(())
        }
    }

    fn prepare(&self, sql: &str) -> ScanResult<(SelectQuery, TableSchema, TableData)> {
        let query = parse_select(sql)?;
        let (schema, data) = self
            .inner
            .table_snapshot(&self.database, &query.table, self.read_ts)?;
        Ok((query, schema, data))
    }

    fn run(&self, sql: &str, scope: &Scope) -> ScanResult<ResultSet> {
        let (query, schema, data) = self.prepare(sql)?;
        let bound = exec::bind(&query, &schema)?;
        let rows = bound.run(exec::rows_in_scope(&data, scope));
        Ok(ResultSet::from_rows(bound.columns, rows))
    }
}

impl ReadOnlyTransaction for MemoryTransaction {
    fn read_timestamp(&self) -> DateTime<Utc> {
        self.read_ts
    }

    fn describe(&self, statement: &Statement) -> ScanResult<Vec<ColumnMeta>> {
        self.ensure_open()?;
        let (query, schema, _) = self.prepare(statement.sql())?;
        Ok(exec::bind(&query, &schema)?.columns)
    }

    fn partition_query(
        &self,
        statement: &Statement,
        options: &PartitionOptions,
    ) -> ScanResult<Vec<PartitionToken>> {
        self.ensure_open()?;
        let (query, schema, data) = self.prepare(statement.sql())?;
        exec::bind(&query, &schema)?;

        let scopes = if query.is_root_partitionable() {
            let estimated_bytes: u64 = data
                .values()
                .map(|row| row.estimated_size() as u64)
                .sum();
            exec::split_scopes(&data, &schema, options.desired_partitions(estimated_bytes))
        } else if query.partitionability_check_disabled() {
            vec![Scope::WholeQuery]
        } else {
            return Err(ScanError::Partition(
                "Query is not root partitionable since it does not have a DistributedUnion at the root"
                    .to_string(),
            ));
        };

        scopes
            .into_iter()
            .enumerate()
            .map(|(index, scope)| {
                let descriptor = TokenDescriptor {
                    transaction_id: self.id.as_u128(),
                    index: u32::try_from(index).map_err(|_| {
                        ScanError::Partition(format!("Too many partitions: {}", index))
                    })?,
                    sql: statement.sql().to_string(),
                    scope,
                };
                bincode::serialize(&descriptor)
                    .map(PartitionToken::from_bytes)
                    .map_err(|e| ScanError::Partition(format!("Cannot encode token: {}", e)))
            })
            .collect()
    }

    fn execute_partition(&self, token: &PartitionToken) -> ScanResult<ResultSet> {
        self.ensure_open()?;
        let descriptor: TokenDescriptor = bincode::deserialize(token.as_bytes())
            .map_err(|e| ScanError::Execution(format!("Invalid partition token: {}", e)))?;
        if descriptor.transaction_id != self.id.as_u128() {
            return Err(ScanError::Execution(
                "Partition token was issued by another transaction".to_string(),
            ));
        }

        self.inner
            .partition_executions
            .fetch_add(1, Ordering::AcqRel);
        let index = descriptor.index as usize;
        if self
            .inner
            .faults
            .read()
            .failing_partitions
            .contains(&index)
        {
            return Err(ScanError::Execution(format!(
                "Injected failure for partition {}",
                index
            )));
        }

        self.run(&descriptor.sql, &descriptor.scope)
    }

    fn execute_query(&self, statement: &Statement) -> ScanResult<ResultSet> {
        self.ensure_open()?;
        self.run(statement.sql(), &Scope::WholeQuery)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.inner.open_transactions.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.close();
    }
}
