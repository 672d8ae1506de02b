use std::process::exit;

use clap::Parser;
use log::error;
use statebench_run::{Cli, run};

fn main() {
    if let Err(e) = run(Cli::parse()) {
        error!("Benchmark failed: {e:#}");
        exit(1);
    }
}
