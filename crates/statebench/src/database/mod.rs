use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde_derive::Serialize;

use crate::Result;

mod memory;

pub use memory::*;

/// The storage port every engine is driven through.
///
/// Implementations must be safe to call from many worker threads at once.
pub trait Database: Send + Sync {
    /// Name of the engine for reporting
    fn name(&self) -> &'static str;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Returns [`crate::Error::NotFound`] when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Persist pending writes
    fn flush(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn metrics(&self) -> DatabaseMetrics;
}

/// Engine reported counters. Fields an engine can't provide stay at zero.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DatabaseMetrics {
    pub cache_size: u64,
    pub mem_table_size: u64,
    pub data_size: u64,
    pub key_count: u64,

    pub bytes_read: u64,
    pub bytes_written: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,
    pub compaction_ops: u64,

    pub read_count: u64,
    pub write_count: u64,
    pub flush_count: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub flush_errors: u64,
    pub read_latency: Duration,
    pub write_latency: Duration,
    pub flush_latency: Duration,

    pub backend_specific: BTreeMap<String, serde_json::Value>,
}

/// Operation counters shared by the engine adapters.
///
/// Latencies are cumulative. A not found read counts as a read, not as an error.
#[derive(Debug, Default)]
pub struct OpCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    flushes: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
    flush_errors: AtomicU64,
    read_nanos: AtomicU64,
    write_nanos: AtomicU64,
    flush_nanos: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl OpCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, f: impl FnOnce() -> Result<Vec<u8>>) -> Result<Vec<u8>> {
        let start = Instant::now();
        let result = f();
        add_elapsed(&self.read_nanos, start);
        self.reads.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(value) => {
                self.bytes_read
                    .fetch_add(value.len() as u64, Ordering::Relaxed);
            }
            Err(e) if e.is_not_found() => {}
            Err(_) => {
                self.read_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    pub fn write(&self, len: usize, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let start = Instant::now();
        let result = f();
        add_elapsed(&self.write_nanos, start);
        self.writes.fetch_add(1, Ordering::Relaxed);
        if result.is_ok() {
            self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
        } else {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub fn flush(&self, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let start = Instant::now();
        let result = f();
        add_elapsed(&self.flush_nanos, start);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.flush_errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Fills the operation fields of `metrics`, leaving engine specific ones untouched.
    pub fn fill(&self, metrics: &mut DatabaseMetrics) {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        metrics.read_count = load(&self.reads);
        metrics.write_count = load(&self.writes);
        metrics.flush_count = load(&self.flushes);
        metrics.read_errors = load(&self.read_errors);
        metrics.write_errors = load(&self.write_errors);
        metrics.flush_errors = load(&self.flush_errors);
        metrics.read_latency = Duration::from_nanos(load(&self.read_nanos));
        metrics.write_latency = Duration::from_nanos(load(&self.write_nanos));
        metrics.flush_latency = Duration::from_nanos(load(&self.flush_nanos));
        metrics.bytes_read = load(&self.bytes_read);
        metrics.bytes_written = load(&self.bytes_written);
    }

    pub fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = DatabaseMetrics::default();
        self.fill(&mut metrics);
        metrics
    }
}

fn add_elapsed(counter: &AtomicU64, start: Instant) {
    counter.fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
}
