//! Test utilities for partscan integration tests
//!
//! Two fixture types available:
//! - TestFixture: in-process store with a connected client and a recording sink
//! - ScriptedBackend: fixed partition contents with optional gated executions
//!
//! Every TestFixture uses its own database id so tests can run in parallel.

#![allow(dead_code)]

pub mod scripted_backend;
pub mod test_fixture;

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
