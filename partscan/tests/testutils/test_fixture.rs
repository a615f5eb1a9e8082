//! Test fixture backed by the in-process snapshot store
//!
//! Uses only the public partscan API.

use partscan::store::DatabaseId;
use partscan::{
    ColumnMeta, ConnectionConfig, MemoryBackend, PartitionOptions, RecordingSink, Row,
    ScanResult, ScanSource, SnapshotClient, SnapshotTransaction, SqlType, TableSchema, Value,
};
use std::sync::Arc;

/// Test fixture with an isolated database
pub struct TestFixture {
    pub backend: MemoryBackend,
    pub config: ConnectionConfig,
    pub sink: Arc<RecordingSink>,
    pub client: SnapshotClient,
}

impl TestFixture {
    /// Empty database, emulator connection
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_emulator(true)
    }

    pub fn with_emulator(use_emulator: bool) -> Result<Self, Box<dyn std::error::Error>> {
        super::init_logging();
        let backend = MemoryBackend::new();
        // Unique id keeps concurrently running tests apart
        let database_id = format!("test_db_{}", fastrand::u32(..));
        let mut config = ConnectionConfig::new("test-project", "test-instance", database_id)
            .with_emulator(use_emulator);
        if !use_emulator {
            config.credentials.oauth_token = Some("test-token".to_string());
        }
        backend.create_database(&config.database());

        let sink = Arc::new(RecordingSink::new());
        let client =
            SnapshotClient::connect_with_sink(Arc::new(backend.clone()), &config, sink.clone())?;

        Ok(Self {
            backend,
            config,
            sink,
            client,
        })
    }

    /// Fixture with table `T (v INT64 PRIMARY KEY)` holding `keys`
    pub fn with_int_table(
        keys: &[i64],
        split_points: &[i64],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let fixture = Self::new()?;
        fixture.create_int_table("T", split_points)?;
        fixture.insert_ints("T", keys)?;
        Ok(fixture)
    }

    pub fn database(&self) -> DatabaseId {
        self.config.database()
    }

    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnMeta>,
        key: &str,
    ) -> ScanResult<()> {
        self.backend
            .create_table(&self.database(), TableSchema::new(name, columns, key)?)
    }

    pub fn create_int_table(&self, name: &str, split_points: &[i64]) -> ScanResult<()> {
        let schema = TableSchema::new(name, vec![ColumnMeta::new("v", SqlType::Int64)], "v")?
            .with_split_points(split_points.iter().copied().map(Value::Int64).collect());
        self.backend.create_table(&self.database(), schema)
    }

    pub fn insert_ints(&self, table: &str, keys: &[i64]) -> ScanResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.backend.upsert(
            &self.database(),
            table,
            keys.iter().map(|k| Row::new(vec![Value::Int64(*k)])).collect(),
        )?;
        Ok(())
    }

    pub fn insert_rows(&self, table: &str, rows: Vec<Vec<Value>>) -> ScanResult<()> {
        self.backend
            .upsert(&self.database(), table, rows.into_iter().map(Row::new).collect())?;
        Ok(())
    }

    pub fn snapshot(&self) -> ScanResult<Arc<SnapshotTransaction>> {
        Ok(Arc::new(self.client.begin_snapshot()?))
    }

    /// Open a scan source over a fresh snapshot with default options
    pub fn source(&self, sql: &str) -> ScanResult<ScanSource> {
        ScanSource::open(self.snapshot()?, sql, &PartitionOptions::default())
    }
}

/// Collect the first column of every row as i64
pub fn int_column(rows: impl IntoIterator<Item = ScanResult<Row>>) -> Vec<i64> {
    rows.into_iter()
        .map(|row| match row {
            Ok(row) => match row.values.first() {
                Some(Value::Int64(v)) => *v,
                other => panic!("expected INT64, got {:?}", other),
            },
            Err(e) => panic!("row failed: {}", e),
        })
        .collect()
}
