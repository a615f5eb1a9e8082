//! Backend with scripted partition contents
//!
//! Every partition is a fixed list of INT64 values in column `v`. Tokens are
//! the little-endian plan index. When gated, executions block until the
//! gate opens; closing a transaction opens it.

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use partscan::config::{Credentials, Endpoint};
use partscan::store::{
    BackendSession, BackendType, DatabaseId, ReadOnlyTransaction, ResultSet, SnapshotBackend,
    Statement, TimestampBound,
};
use partscan::{
    ColumnMeta, PartitionOptions, PartitionToken, Row, ScanError, ScanResult, SqlType, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Script {
    partitions: Vec<Vec<i64>>,
    partitionable: bool,
    gated: bool,
    gate_open: Mutex<bool>,
    gate_changed: Condvar,
    executions: Vec<AtomicUsize>,
    query_executions: AtomicUsize,
    in_flight: AtomicUsize,
    sessions: AtomicUsize,
}

impl Script {
    fn open_gate(&self) {
        *self.gate_open.lock() = true;
        self.gate_changed.notify_all();
    }

    fn pass_gate(&self) {
        if !self.gated {
            return;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let mut open = self.gate_open.lock();
        while !*open {
            self.gate_changed.wait(&mut open);
        }
        drop(open);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn result(values: impl IntoIterator<Item = i64>) -> ResultSet {
        ResultSet::from_rows(
            columns(),
            values
                .into_iter()
                .map(|v| Row::new(vec![Value::Int64(v)]))
                .collect(),
        )
    }
}

fn columns() -> Vec<ColumnMeta> {
    vec![ColumnMeta::new("v", SqlType::Int64)]
}

/// Backend serving a fixed plan
#[derive(Clone)]
pub struct ScriptedBackend {
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new(partitions: Vec<Vec<i64>>) -> Self {
        Self::build(partitions, true, false)
    }

    /// Partition executions block until the gate opens
    pub fn gated(partitions: Vec<Vec<i64>>) -> Self {
        Self::build(partitions, true, true)
    }

    /// Every partitioning request fails with a `Partition` error
    pub fn unpartitionable(rows: Vec<i64>) -> Self {
        Self::build(vec![rows], false, false)
    }

    fn build(partitions: Vec<Vec<i64>>, partitionable: bool, gated: bool) -> Self {
        let executions = partitions.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            script: Arc::new(Script {
                partitions,
                partitionable,
                gated,
                gate_open: Mutex::new(false),
                gate_changed: Condvar::new(),
                executions,
                query_executions: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                sessions: AtomicUsize::new(0),
            }),
        }
    }

    pub fn executions(&self, index: usize) -> usize {
        self.script.executions[index].load(Ordering::Acquire)
    }

    pub fn query_executions(&self) -> usize {
        self.script.query_executions.load(Ordering::Acquire)
    }

    pub fn active_sessions(&self) -> usize {
        self.script.sessions.load(Ordering::Acquire)
    }

    pub fn open_gate(&self) {
        self.script.open_gate();
    }

    /// Wait until `count` executions are blocked at the gate
    pub fn wait_for_in_flight(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.script.in_flight.load(Ordering::Acquire) >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

impl SnapshotBackend for ScriptedBackend {
    fn create_session(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> ScanResult<BackendSession> {
        let id = self.script.sessions.fetch_add(1, Ordering::AcqRel);
        Ok(BackendSession {
            id: format!("scripted-{}", id),
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
        })
    }

    fn begin_read_only(
        &self,
        _session: &BackendSession,
        _database: &DatabaseId,
        _bound: TimestampBound,
    ) -> ScanResult<Box<dyn ReadOnlyTransaction>> {
        Ok(Box::new(ScriptedTransaction {
            script: Arc::clone(&self.script),
            read_timestamp: Utc::now(),
            closed: AtomicBool::new(false),
        }))
    }

    fn release_session(&self, _session: &BackendSession) {
        self.script.sessions.fetch_sub(1, Ordering::AcqRel);
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Custom("scripted".to_string())
    }
}

struct ScriptedTransaction {
    script: Arc<Script>,
    read_timestamp: DateTime<Utc>,
    closed: AtomicBool,
}

impl ScriptedTransaction {
    fn ensure_open(&self) -> ScanResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(ScanError::Closed)
        } else {
            Ok(())
        }
    }
}

impl ReadOnlyTransaction for ScriptedTransaction {
    fn read_timestamp(&self) -> DateTime<Utc> {
        self.read_timestamp
    }

    fn describe(&self, _statement: &Statement) -> ScanResult<Vec<ColumnMeta>> {
        self.ensure_open()?;
        Ok(columns())
    }

    fn partition_query(
        &self,
        _statement: &Statement,
        _options: &PartitionOptions,
    ) -> ScanResult<Vec<PartitionToken>> {
        self.ensure_open()?;
        if !self.script.partitionable {
            return Err(ScanError::Partition("scripted: not partitionable".to_string()));
        }
        Ok((0..self.script.partitions.len() as u64)
            .map(|i| PartitionToken::from_bytes(i.to_le_bytes().to_vec()))
            .collect())
    }

    fn execute_partition(&self, token: &PartitionToken) -> ScanResult<ResultSet> {
        self.ensure_open()?;
        let bytes: [u8; 8] = token
            .as_bytes()
            .try_into()
            .map_err(|_| ScanError::Execution("bad token".to_string()))?;
        let index = u64::from_le_bytes(bytes) as usize;
        let rows = self
            .script
            .partitions
            .get(index)
            .ok_or_else(|| ScanError::Execution(format!("no partition {}", index)))?;

        self.script.executions[index].fetch_add(1, Ordering::AcqRel);
        self.script.pass_gate();
        self.ensure_open()?;
        Ok(Script::result(rows.iter().copied()))
    }

    fn execute_query(&self, _statement: &Statement) -> ScanResult<ResultSet> {
        self.ensure_open()?;
        self.script.query_executions.fetch_add(1, Ordering::AcqRel);
        Ok(Script::result(
            self.script.partitions.iter().flatten().copied(),
        ))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.script.open_gate();
    }
}
