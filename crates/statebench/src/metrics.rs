use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crossbeam::channel::Receiver;
use log::info;
use serde_derive::Serialize;

use crate::{BenchConfig, DatabaseMetrics, Result, WorkloadConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Write,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Read => "read",
        })
    }
}

/// Outcome counters updated by every worker of a phase.
#[derive(Debug, Default)]
pub struct Counters {
    reads: AtomicU64,
    successful_reads: AtomicU64,
    not_found: AtomicU64,
    failed_reads: AtomicU64,
    writes: AtomicU64,
    successful_writes: AtomicU64,
    failed_writes: AtomicU64,
}

impl Counters {
    pub fn record_read<T>(&self, result: &Result<T>) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(_) => &self.successful_reads,
            Err(e) if e.is_not_found() => &self.not_found,
            Err(_) => &self.failed_reads,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write<T>(&self, result: &Result<T>) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let counter = if result.is_ok() {
            &self.successful_writes
        } else {
            &self.failed_writes
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        CounterSnapshot {
            reads: load(&self.reads),
            successful_reads: load(&self.successful_reads),
            not_found: load(&self.not_found),
            failed_reads: load(&self.failed_reads),
            writes: load(&self.writes),
            successful_writes: load(&self.successful_writes),
            failed_writes: load(&self.failed_writes),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub reads: u64,
    pub successful_reads: u64,
    pub not_found: u64,
    pub failed_reads: u64,
    pub writes: u64,
    pub successful_writes: u64,
    pub failed_writes: u64,
}

impl CounterSnapshot {
    pub fn operations(&self) -> u64 {
        self.reads + self.writes
    }
}

/// Latency summary of one phase. Percentiles use the nearest rank over histogram buckets, so
/// they carry at most 1/32 relative error and never exceed `max`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyStats {
    /// Drains `samples` until every sender is dropped.
    pub fn collect(samples: Receiver<Duration>) -> Self {
        let mut histogram = LatencyHistogram::new();
        samples.iter().for_each(|d| histogram.record(d));
        histogram.stats()
    }
}

const SUB_BUCKET_BITS: u32 = 5;
const SUB_BUCKETS: usize = 1 << SUB_BUCKET_BITS;
const BUCKETS: usize = (64 - SUB_BUCKET_BITS as usize + 1) * SUB_BUCKETS;

/// Fixed-size log-linear histogram of nanosecond latencies. Values below 32ns are exact, every
/// power of two above is split into 32 equal buckets.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    buckets: Box<[u64]>,
    count: u64,
    total_nanos: u128,
    min: u64,
    max: u64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: vec![0; BUCKETS].into_boxed_slice(),
            count: 0,
            total_nanos: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    pub fn record(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.buckets[bucket_index(nanos)] += 1;
        self.count += 1;
        self.total_nanos += u128::from(nanos);
        self.min = self.min.min(nanos);
        self.max = self.max.max(nanos);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Nearest-rank percentile, `p` in `0.0..=1.0`.
    pub fn percentile(&self, p: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let rank = ((p * self.count as f64).ceil() as u64).clamp(1, self.count);
        let mut seen = 0u64;
        for (i, n) in self.buckets.iter().enumerate() {
            seen += *n;
            if seen >= rank {
                return Duration::from_nanos(bucket_high(i).clamp(self.min, self.max));
            }
        }
        Duration::from_nanos(self.max)
    }

    pub fn stats(&self) -> LatencyStats {
        if self.count == 0 {
            return LatencyStats::default();
        }
        let mean = self.total_nanos / u128::from(self.count);
        LatencyStats {
            count: self.count,
            total: nanos_to_duration(self.total_nanos),
            min: Duration::from_nanos(self.min),
            max: Duration::from_nanos(self.max),
            mean: nanos_to_duration(mean),
            p50: self.percentile(0.50),
            p95: self.percentile(0.95),
            p99: self.percentile(0.99),
        }
    }
}

fn bucket_index(nanos: u64) -> usize {
    if nanos < SUB_BUCKETS as u64 {
        return nanos as usize;
    }
    let magnitude = 63 - nanos.leading_zeros();
    let shift = magnitude - SUB_BUCKET_BITS;
    let sub = (nanos >> shift) as usize & (SUB_BUCKETS - 1);
    (shift as usize + 1) * SUB_BUCKETS + sub
}

/// Largest value that lands in bucket `i`.
fn bucket_high(i: usize) -> u64 {
    if i < SUB_BUCKETS {
        return i as u64;
    }
    let shift = (i / SUB_BUCKETS - 1) as u32;
    let low = ((SUB_BUCKETS + i % SUB_BUCKETS) as u64) << shift;
    low + ((1u64 << shift) - 1)
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % 1_000_000_000) as u32)
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub workers: usize,
    pub elapsed: Duration,
    pub counters: CounterSnapshot,
    pub latency: LatencyStats,
    /// The phase ended early because a stop was requested.
    pub stopped: bool,
}

impl PhaseReport {
    /// Completed operations per second of wall clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.counters.operations() as f64 / secs
        }
    }

    pub fn log(&self) {
        let c = &self.counters;
        match self.phase {
            Phase::Write => info!(
                "Write benchmark complete: {} written ({} failed) in {}, {}, avg latency {}, p99 {}{}",
                c.successful_writes,
                c.failed_writes,
                format_duration(self.elapsed),
                format_throughput(c.operations(), self.elapsed),
                format_duration(self.latency.mean),
                format_duration(self.latency.p99),
                stopped_suffix(self.stopped),
            ),
            Phase::Read => info!(
                "Read benchmark complete: {} reads ({} found, {} not found, {} failed), {} writes ({} failed) in {}, {}, avg latency {}, p99 {}{}",
                c.reads,
                c.successful_reads,
                c.not_found,
                c.failed_reads,
                c.writes,
                c.failed_writes,
                format_duration(self.elapsed),
                format_throughput(c.operations(), self.elapsed),
                format_duration(self.latency.mean),
                format_duration(self.latency.p99),
                stopped_suffix(self.stopped),
            ),
        }
    }
}

fn stopped_suffix(stopped: bool) -> &'static str {
    if stopped { " (stopped early)" } else { "" }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub benchmark_id: String,
    pub workload: String,
    pub database: String,
    pub config: BenchConfig,
    pub workload_config: Option<WorkloadConfig>,
    pub write: Option<PhaseReport>,
    pub read: PhaseReport,
    pub database_metrics: DatabaseMetrics,
}

impl BenchmarkSummary {
    pub fn stopped(&self) -> bool {
        self.read.stopped || self.write.as_ref().is_some_and(|w| w.stopped)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Engine side totals. Each phase logs its own report as it ends.
    pub fn log(&self) {
        let m = &self.database_metrics;
        info!(
            "{}: {} keys, {} data, {} read, {} written, {} flushes",
            self.database,
            m.key_count,
            format_size(m.data_size),
            format_size(m.bytes_read),
            format_size(m.bytes_written),
            m.flush_count,
        );
        if let Some(write) = &self.write {
            info!(
                "Write bandwidth: {}",
                format_bandwidth(m.bytes_written, write.elapsed)
            );
        }
        info!("Benchmark complete: {}", self.benchmark_id);
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        format!("{:.2} µs", secs * 1_000_000.0)
    } else if secs < 1.0 {
        format!("{:.2} ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.2} s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let secs = secs % 60.0;
        format!("{:.0}m {:.2}s", mins, secs)
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_throughput(ops: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.000001 {
        return String::from("N/A");
    }
    let ops_per_sec = ops as f64 / secs;
    if ops_per_sec >= 1_000_000.0 {
        format!("{:.2} M ops/s", ops_per_sec / 1_000_000.0)
    } else if ops_per_sec >= 1_000.0 {
        format!("{:.2} K ops/s", ops_per_sec / 1_000.0)
    } else {
        format!("{:.2} ops/s", ops_per_sec)
    }
}

pub fn format_bandwidth(bytes: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.000001 {
        return String::from("N/A");
    }
    let mb_per_sec = bytes as f64 / secs / (1024.0 * 1024.0);
    if mb_per_sec >= 1024.0 {
        format!("{:.2} GB/s", mb_per_sec / 1024.0)
    } else {
        format!("{:.2} MB/s", mb_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_bucket_bounds_cover_every_value() {
        for i in 0..BUCKETS {
            let high = bucket_high(i);
            assert_eq!(bucket_index(high), i);
            if i > 0 {
                assert_eq!(bucket_index(bucket_high(i - 1) + 1), i);
            }
        }
        assert_eq!(bucket_high(BUCKETS - 1), u64::MAX);
        assert_eq!(bucket_index(1_000), bucket_index(1_007));
        assert_ne!(bucket_index(1_007), bucket_index(1_008));
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = LatencyHistogram::new();
        assert_eq!(histogram.count(), 0);
        assert_eq!(histogram.percentile(0.99), Duration::ZERO);
        assert_eq!(histogram.stats(), LatencyStats::default());
    }

    #[test]
    fn test_counters_classify_reads() {
        let counters = Counters::default();
        counters.record_read(&Ok(vec![1u8]));
        counters.record_read::<()>(&Err(Error::NotFound));
        counters.record_read::<()>(&Err(Error::Closed));
        counters.record_write(&Ok(()));
        counters.record_write::<()>(&Err(Error::Closed));

        let c = counters.snapshot();
        assert_eq!((c.reads, c.successful_reads, c.not_found, c.failed_reads), (3, 1, 1, 1));
        assert_eq!((c.writes, c.successful_writes, c.failed_writes), (2, 1, 1));
        assert_eq!(c.operations(), 5);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_duration(Duration::from_millis(250)), "250.00 ms");
        assert_eq!(format_throughput(2_000, Duration::from_secs(1)), "2.00 K ops/s");
        assert_eq!(format_throughput(1, Duration::ZERO), "N/A");
    }
}
