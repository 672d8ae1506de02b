use std::{
    fs::File,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, Sender, bounded, select, tick};
use log::{error, info, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde_derive::{Deserialize, Serialize};

use crate::{
    BenchmarkSummary, CounterSnapshot, Counters, Database, Error, Exit, KeyFileReader,
    KeyFileWriter, LatencyStats, Phase, PhaseReport, Result, Workload, WorkloadConfig,
};

const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

/// Run level settings, shared by both phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub benchmark_id: String,
    /// Keys generated by the workload, for the write phase and its replay
    pub key_count: usize,
    pub concurrency: usize,
    pub seed: u64,
    pub write_enabled: bool,
    /// Read phase key source when writes are disabled. Standard input when absent.
    pub keys_file: Option<PathBuf>,
    /// Job queue capacity, `2 × concurrency` when absent
    pub queue_depth: Option<usize>,
    pub progress_interval: Duration,
    /// Let the workload choose between a read and a write for each read phase key
    pub mixed_operations: bool,
    /// Also write the write phase keys to this key file
    pub dump_keys: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            benchmark_id: "default".to_string(),
            key_count: 1_000_000,
            concurrency: 1,
            seed: 42,
            write_enabled: false,
            keys_file: None,
            queue_depth: None,
            progress_interval: Duration::from_secs(1),
            mixed_operations: false,
            dump_keys: None,
        }
    }
}

impl BenchConfig {
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_depth.unwrap_or(2 * self.workers()).max(1)
    }

    pub fn key_source(&self) -> KeySource {
        if self.write_enabled {
            KeySource::Workload
        } else if let Some(path) = &self.keys_file {
            KeySource::File(path.clone())
        } else {
            KeySource::Stdin
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.queue_depth == Some(0) {
            return Err(Error::InvalidConfig(
                "queue depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the read phase takes its keys from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Replay of the write phase sequence, same seed and count
    Workload,
    File(PathBuf),
    Stdin,
}

type Keys<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// One benchmark run of a workload against a database.
pub struct Benchmark<'a> {
    config: &'a BenchConfig,
    workload: &'a dyn Workload,
    db: &'a dyn Database,
    exit: Exit,
    workload_config: Option<WorkloadConfig>,
}

impl<'a> Benchmark<'a> {
    pub fn new(config: &'a BenchConfig, workload: &'a dyn Workload, db: &'a dyn Database) -> Self {
        Self {
            config,
            workload,
            db,
            exit: Exit::new(),
            workload_config: None,
        }
    }

    /// Stop coordinator observed by the producers. Flushes hold its lock.
    pub fn with_exit(mut self, exit: Exit) -> Self {
        self.exit = exit;
        self
    }

    /// Embedded in the summary for reporting.
    pub fn with_workload_config(mut self, config: WorkloadConfig) -> Self {
        self.workload_config = Some(config);
        self
    }

    pub fn run(&self) -> Result<BenchmarkSummary> {
        self.config.validate()?;
        let config = self.config;

        info!(
            "Starting benchmark {}: workload {}, database {}, {} keys, {} workers, seed {}, writes {}",
            config.benchmark_id,
            self.workload.name(),
            self.db.name(),
            config.key_count,
            config.workers(),
            config.seed,
            if config.write_enabled { "enabled" } else { "disabled" },
        );
        info!("{}", self.workload.description());

        let write = if config.write_enabled {
            Some(self.write_phase()?)
        } else {
            None
        };
        let read = self.read_phase()?;

        Ok(BenchmarkSummary {
            benchmark_id: config.benchmark_id.clone(),
            workload: self.workload.name().to_string(),
            database: self.db.name().to_string(),
            config: config.clone(),
            workload_config: self.workload_config.clone(),
            write,
            read,
            database_metrics: self.db.metrics(),
        })
    }

    fn write_phase(&self) -> Result<PhaseReport> {
        info!("Generating keys for write mode");
        let mut dump = self
            .config
            .dump_keys
            .as_deref()
            .map(KeyFileWriter::create)
            .transpose()?;

        let keys = self
            .workload
            .generate_keys(self.config.seed, self.config.key_count);
        let report = self.run_phase(Phase::Write, Box::new(keys.map(Ok)), dump.as_mut())?;

        if let Some(dump) = dump {
            let written = dump.written();
            dump.finish()?;
            info!("Dumped {written} keys");
        }
        report.log();

        let _lock = self.exit.lock();
        if let Err(e) = self.db.flush() {
            error!("Flush failed: {e}");
            return Err(e);
        }
        Ok(report)
    }

    fn read_phase(&self) -> Result<PhaseReport> {
        let keys: Keys<'_> = match self.config.key_source() {
            KeySource::Workload => Box::new(
                self.workload
                    .generate_keys(self.config.seed, self.config.key_count)
                    .map(Ok),
            ),
            KeySource::File(path) => {
                info!("Loading keys from {}", path.display());
                Box::new(KeyFileReader::open(&path)?)
            }
            KeySource::Stdin => {
                info!("Loading keys from standard input");
                Box::new(KeyFileReader::stdin())
            }
        };
        let report = self.run_phase(Phase::Read, keys, None)?;
        report.log();
        Ok(report)
    }

    /// Feeds `keys` through a bounded queue to the worker pool, until the keys run out or a
    /// stop is requested. A key source error ends the phase with that error once the
    /// queued keys are drained.
    fn run_phase(
        &self,
        phase: Phase,
        keys: Keys<'_>,
        dump: Option<&mut KeyFileWriter<File>>,
    ) -> Result<PhaseReport> {
        let workers = self.config.workers();
        let capacity = self.config.queue_capacity();
        info!("Beginning {phase} loop with {workers} workers");

        let counters = Counters::default();
        let (job_tx, job_rx) = bounded::<Vec<u8>>(capacity);
        let (latency_tx, latency_rx) = bounded::<Duration>(capacity);
        let (done_tx, done_rx) = bounded::<()>(0);

        let start = Instant::now();
        let (produced, workers_ok, elapsed, latency, reporter_ok) = thread::scope(|s| {
            let aggregator = s.spawn(move || LatencyStats::collect(latency_rx));
            let counters = &counters;

            let handles: Vec<_> = (0..workers)
                .map(|i| {
                    let jobs = job_rx.clone();
                    let latencies = latency_tx.clone();
                    s.spawn(move || self.work(phase, i, jobs, latencies, counters))
                })
                .collect();
            drop(job_rx);
            drop(latency_tx);

            let interval = self.config.progress_interval.max(MIN_PROGRESS_INTERVAL);
            let reporter = s.spawn(move || report_progress(phase, interval, done_rx, counters));

            let produced = self.produce(keys, job_tx, dump);

            let workers_ok = handles
                .into_iter()
                .fold(true, |ok, handle| handle.join().is_ok() && ok);
            let elapsed = start.elapsed();
            drop(done_tx);

            let reporter_ok = reporter.join().is_ok();
            let latency = aggregator.join();
            (produced, workers_ok, elapsed, latency, reporter_ok)
        });

        if !workers_ok || !reporter_ok {
            return Err(Error::Str("a benchmark thread panicked"));
        }
        let latency = latency.map_err(|_| Error::Str("the latency aggregator panicked"))?;
        let stopped = produced?;

        let report = PhaseReport {
            phase,
            workers,
            elapsed,
            counters: counters.snapshot(),
            latency,
            stopped,
        };
        if stopped {
            warn!("{phase} phase stopped early");
        }
        Ok(report)
    }

    /// Returns whether production ended because of a stop request.
    fn produce(
        &self,
        keys: Keys<'_>,
        jobs: Sender<Vec<u8>>,
        mut dump: Option<&mut KeyFileWriter<File>>,
    ) -> Result<bool> {
        for key in keys {
            if self.exit.is_stopped() {
                return Ok(true);
            }
            let key = key?;
            if let Some(dump) = dump.as_deref_mut() {
                dump.write_key(&key)?;
            }
            if jobs.send(key).is_err() {
                // Every worker is gone, the join reports why.
                break;
            }
        }
        Ok(false)
    }

    fn work(
        &self,
        phase: Phase,
        index: usize,
        jobs: Receiver<Vec<u8>>,
        latencies: Sender<Duration>,
        counters: &Counters,
    ) {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(index as u64));
        let mut aggregating = true;
        for key in jobs {
            let read = match phase {
                Phase::Write => false,
                Phase::Read => {
                    !self.config.mixed_operations || self.workload.should_read(&key, &mut rng)
                }
            };

            let latency = if read {
                let start = Instant::now();
                let result = self.db.get(&key);
                let latency = start.elapsed();
                counters.record_read(&result);
                latency
            } else {
                let value = self.workload.generate_value(&mut rng, &key);
                let start = Instant::now();
                let result = self.db.set(&key, &value);
                let latency = start.elapsed();
                counters.record_write(&result);
                latency
            };
            // The aggregator only hangs up by panicking, the counters still see every operation.
            if aggregating && latencies.send(latency).is_err() {
                aggregating = false;
                warn!("{phase} worker {index}: latency aggregator is gone, latencies are dropped");
            }
        }
    }
}

fn report_progress(phase: Phase, interval: Duration, done: Receiver<()>, counters: &Counters) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => log_progress(phase, counters.snapshot()),
            recv(done) -> _ => return,
        }
    }
}

fn log_progress(phase: Phase, c: CounterSnapshot) {
    match phase {
        Phase::Write => info!("Writes in progress: {}", c.writes),
        Phase::Read => info!("Reads in progress: {} reads, {} writes", c.reads, c.writes),
    }
}
