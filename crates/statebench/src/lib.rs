#![doc = include_str!("../README.md")]

mod database;
mod error;
mod exit;
mod keys;
mod metrics;
mod runner;
mod transaction;
mod workload;

pub mod trie;
pub mod util;

pub use database::*;
pub use error::*;
pub use exit::*;
pub use keys::*;
pub use metrics::*;
pub use runner::*;
pub use transaction::*;
pub use workload::*;
