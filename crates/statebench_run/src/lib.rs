#![doc = include_str!("../README.md")]

use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};
use statebench::{Benchmark, BenchmarkSummary, Exit, create_workload};

mod cli;
mod engine;
mod fjall_impl;
mod lmdb_impl;
mod logger;
mod redb_impl;
mod rocksdb_impl;

pub use cli::*;
pub use engine::*;
pub use fjall_impl::*;
pub use lmdb_impl::*;
pub use redb_impl::*;
pub use rocksdb_impl::*;

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => {
            logger::init(args.log_format);

            let exit = Exit::new();
            if let Err(e) = exit.set_ctrlc_handler() {
                warn!("{e}");
            }

            run_benchmark(&args, exit).map(|_| ())
        }
    }
}

/// Opens the engine, runs both phases and writes the report. The engine is closed even
/// when the run fails.
pub fn run_benchmark(args: &RunArgs, exit: Exit) -> Result<BenchmarkSummary> {
    let config = args.bench_config();
    config.validate()?;

    let workload_config = args.workload_config();
    let workload = create_workload(&workload_config);

    let engine_config = args.engine_config();
    let db = open(&engine_config).with_context(|| {
        format!(
            "couldn't open {} at {}",
            engine_config.database,
            engine_config.path.display()
        )
    })?;

    let result = Benchmark::new(&config, workload.as_ref(), db.as_ref())
        .with_exit(exit.clone())
        .with_workload_config(workload_config)
        .run();

    let closed = {
        let _lock = exit.lock();
        db.close()
    };
    let summary = result?;
    closed.context("couldn't close the database")?;

    summary.log();

    if let Some(path) = &args.report {
        fs::write(path, summary.to_json()?)
            .with_context(|| format!("couldn't write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(summary)
}
