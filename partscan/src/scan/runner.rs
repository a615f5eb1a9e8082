// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parallel scan runner
//!
//! Runs a fixed number of workers on a dedicated thread pool. Each worker
//! loops on [`ScanSource::fetch`] until the source is exhausted, decodes the
//! rows it receives and forwards them to a [`RowSink`] in bounded batches.
//! The first failure is kept, the source is closed, and the remaining
//! workers wind down.

use super::source::{ScanPath, ScanSource};
use crate::bridge::{OutputRow, RowBridge};
use crate::cursor::CursorStats;
use crate::error::{ScanError, ScanResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default number of rows forwarded per sink call
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Receiver of decoded rows
pub trait RowSink: Send + Sync {
    /// `partition` is the plan index, or `None` for single-shot reads
    fn write_batch(&self, partition: Option<usize>, rows: Vec<OutputRow>) -> ScanResult<()>;
}

/// Sink that keeps every batch in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<(Option<usize>, Vec<OutputRow>)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(Option<usize>, Vec<OutputRow>)> {
        self.batches.lock().clone()
    }

    /// Every row received, in arrival order
    pub fn rows(&self) -> Vec<OutputRow> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }
}

impl RowSink for CollectingSink {
    fn write_batch(&self, partition: Option<usize>, rows: Vec<OutputRow>) -> ScanResult<()> {
        self.batches.lock().push((partition, rows));
        Ok(())
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub path: ScanPath,
    /// Sink calls made
    pub batches: usize,
    pub rows: usize,
    pub stats: CursorStats,
    pub elapsed: Duration,
}

#[derive(Default)]
struct RunState {
    batches: AtomicUsize,
    rows: AtomicUsize,
    first_error: Mutex<Option<ScanError>>,
}

impl RunState {
    fn failed(&self) -> bool {
        self.first_error.lock().is_some()
    }

    fn fail(&self, source: &ScanSource, error: ScanError) {
        let mut first = self.first_error.lock();
        if first.is_none() {
            log::error!("Scan failed: {}", error);
            *first = Some(error);
            source.close();
        }
    }
}

/// Drives a [`ScanSource`] with a fixed number of workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRunner {
    workers: usize,
    batch_size: usize,
}

impl ScanRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Read every partition of `source` into `sink`
    ///
    /// The source is left open on success; on failure it is closed and the
    /// first error is returned.
    pub fn run(
        &self,
        source: &ScanSource,
        bridge: &RowBridge,
        sink: &dyn RowSink,
    ) -> ScanResult<RunSummary> {
        if self.workers == 0 {
            return Err(ScanError::Configuration(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ScanError::Configuration(
                "Batch size must be at least 1".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("partscan-worker-{}", index))
            .build()
            .map_err(|e| ScanError::Configuration(format!("Cannot start worker pool: {}", e)))?;

        log::info!("Scanning with {} workers via {} path", self.workers, source.path());
        let started = Instant::now();
        let state = RunState::default();

        pool.scope(|scope| {
            for worker in 0..self.workers {
                let state = &state;
                scope.spawn(move |_| self.work(worker, source, bridge, sink, state));
            }
        });

        if let Some(error) = state.first_error.lock().take() {
            return Err(error);
        }

        let summary = RunSummary {
            path: source.path().clone(),
            batches: state.batches.load(Ordering::Acquire),
            rows: state.rows.load(Ordering::Acquire),
            stats: source.stats(),
            elapsed: started.elapsed(),
        };
        log::info!(
            "Scan finished: {} rows in {} batches ({:?})",
            summary.rows,
            summary.batches,
            summary.elapsed
        );
        Ok(summary)
    }

    fn work(
        &self,
        worker: usize,
        source: &ScanSource,
        bridge: &RowBridge,
        sink: &dyn RowSink,
        state: &RunState,
    ) {
        while !state.failed() {
            let stream = match source.fetch() {
                Ok(Some(stream)) => stream,
                Ok(None) => break,
                Err(e) => {
                    state.fail(source, e);
                    break;
                }
            };

            let partition = stream.partition_index();
            log::debug!("Worker {} reading partition {:?}", worker, partition);
            if let Err(e) = self.drain(stream, bridge, sink, state) {
                state.fail(source, e);
                break;
            }
        }
    }

    fn drain(
        &self,
        stream: crate::transaction::RowBatchStream,
        bridge: &RowBridge,
        sink: &dyn RowSink,
        state: &RunState,
    ) -> ScanResult<()> {
        let partition = stream.partition_index();
        let mut buffer = Vec::with_capacity(self.batch_size);

        for row in stream {
            buffer.push(bridge.decode_row(&row?)?);
            if buffer.len() == self.batch_size {
                self.flush(partition, &mut buffer, sink, state)?;
            }
        }
        if !buffer.is_empty() {
            self.flush(partition, &mut buffer, sink, state)?;
        }
        Ok(())
    }

    fn flush(
        &self,
        partition: Option<usize>,
        buffer: &mut Vec<OutputRow>,
        sink: &dyn RowSink,
        state: &RunState,
    ) -> ScanResult<()> {
        let rows = std::mem::replace(buffer, Vec::with_capacity(self.batch_size));
        let count = rows.len();
        sink.write_batch(partition, rows)?;
        state.batches.fetch_add(1, Ordering::AcqRel);
        state.rows.fetch_add(count, Ordering::AcqRel);
        Ok(())
    }
}
