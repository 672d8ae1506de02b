use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use statebench::{BenchConfig, MixOverrides, ModelOverrides, WorkloadConfig, WorkloadType};

use crate::{DatabaseType, EngineConfig, LmdbConfig};

#[derive(Parser, Debug)]
#[command(
    name = "statebench",
    version,
    about = "Key-value storage benchmark driven by blockchain state workloads"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a benchmark against one storage engine
    Run(Box<RunArgs>),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of keys to use in the benchmark
    #[arg(long, default_value_t = 1_000_000)]
    pub key_count: usize,

    /// Read ratio of the mixed operations mode (e.g. 0.7 = 70% reads)
    #[arg(long, default_value_t = 0.7)]
    pub read_ratio: f64,

    /// Size of each generic value in bytes
    #[arg(long, default_value_t = 256)]
    pub value_size: usize,

    /// Seed for deterministic key and value generation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Path to store database files (dbs/{engine}/name pattern)
    #[arg(long, default_value = "dbs/rocksdb/rocksdb-test-db")]
    pub db_path: PathBuf,

    /// Tag attached to logs and the report
    #[arg(long, default_value = "default")]
    pub benchmark_id: String,

    /// Write the workload keys before the read phase
    #[arg(long)]
    pub write: bool,

    /// Key file to read when writes are disabled, standard input when absent
    #[arg(long)]
    pub keys_file: Option<PathBuf>,

    /// Number of concurrent workers for reads and writes
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Job queue capacity, twice the worker count when absent
    #[arg(long)]
    pub queue_depth: Option<usize>,

    /// Let the workload pick a read or a write for each read phase key
    #[arg(long)]
    pub mixed_operations: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    /// RocksDB block cache size in bytes, negative disables the cache
    #[arg(long, default_value_t = 8 << 20, allow_negative_numbers = true)]
    pub block_cache_size: i64,

    #[arg(long, value_enum, default_value_t = DatabaseType::Rocksdb)]
    pub database: DatabaseType,

    #[command(flatten)]
    pub lmdb: LmdbArgs,

    #[command(flatten)]
    pub workload: WorkloadArgs,

    #[command(flatten)]
    pub transaction: TransactionArgs,

    /// Also write the write phase keys to this key file
    #[arg(long)]
    pub dump_keys: Option<PathBuf>,

    /// Write the JSON summary to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Environment options of the LMDB engine, under their MDBX names.
#[derive(Args, Debug, Clone)]
pub struct LmdbArgs {
    /// Maximum map size in bytes (-1 for default)
    #[arg(long = "mdbx-map-size", default_value_t = -1, allow_negative_numbers = true)]
    pub map_size: i64,

    /// Maximum number of databases (0 for default: 2)
    #[arg(long = "mdbx-max-dbs", default_value_t = 0)]
    pub max_dbs: u32,

    /// Maximum number of readers (0 for default: 128)
    #[arg(long = "mdbx-max-readers", default_value_t = 0)]
    pub max_readers: u32,

    /// Don't fsync after commit
    #[arg(long = "mdbx-no-sync")]
    pub no_sync: bool,

    /// Don't fsync the metapage after commit
    #[arg(long = "mdbx-no-meta-sync")]
    pub no_meta_sync: bool,

    /// Use a writeable memory map
    #[arg(long = "mdbx-write-map")]
    pub write_map: bool,

    /// Disable readahead
    #[arg(long = "mdbx-no-readahead")]
    pub no_readahead: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WorkloadArgs {
    /// generic, pos-blocks, pos-accounts, pos-state, pos-mixed, pos-accounts-realistic,
    /// pos-state-realistic or transaction-execution
    #[arg(long = "workload", default_value = "generic")]
    pub workload_type: WorkloadType,

    /// Probability of accessing recent blocks
    #[arg(long, default_value_t = 0.8)]
    pub recent_block_bias: f64,

    /// Share of accounts that receive most accesses
    #[arg(long, default_value_t = 0.2)]
    pub hot_account_ratio: f64,

    /// Probability of accessing related state
    #[arg(long, default_value_t = 0.3)]
    pub state_locality: f64,

    /// Range of block numbers to simulate
    #[arg(long, default_value_t = 100_000)]
    pub block_range: u64,

    /// Number of unique accounts to simulate
    #[arg(long, default_value_t = 100_000)]
    pub account_count: usize,

    /// Average storage slots per account
    #[arg(long, default_value_t = 5.0)]
    pub storage_slot_ratio: f64,
}

/// Transaction model and mix of the transaction execution workload. Negative overrides keep
/// the network or mix default.
#[derive(Args, Debug, Clone)]
pub struct TransactionArgs {
    /// ethereum, polygon, testnet or custom
    #[arg(long, default_value = "ethereum")]
    pub network_type: String,

    /// balanced, ethereum, polygon, defi-heavy or transfer-heavy
    #[arg(long, default_value = "balanced")]
    pub transaction_mix: String,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_hot_account_prob: f64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_storage_locality: f64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_cache_hit_ratio: f64,

    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub tx_account_trie_depth: i64,

    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub tx_storage_trie_depth: i64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_read_write_ratio: f64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_contract_ratio: f64,

    /// Transactions per block
    #[arg(long, default_value_t = 100)]
    pub tx_per_block: u32,

    /// Target gas per block
    #[arg(long, default_value_t = 15_000_000)]
    pub gas_target_per_block: u64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_simple_transfer_ratio: f64,

    #[arg(long = "tx-erc20-transfer-ratio", default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_erc20_transfer_ratio: f64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_uniswap_swap_ratio: f64,

    #[arg(long = "tx-complex-defi-ratio", default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_complex_defi_ratio: f64,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub tx_contract_deploy_ratio: f64,
}

impl TransactionArgs {
    pub fn model_overrides(&self) -> ModelOverrides {
        ModelOverrides {
            hot_account_probability: ratio(self.tx_hot_account_prob),
            storage_locality_factor: ratio(self.tx_storage_locality),
            cache_hit_ratio: ratio(self.tx_cache_hit_ratio),
            account_trie_depth: depth(self.tx_account_trie_depth),
            storage_trie_depth: depth(self.tx_storage_trie_depth),
            read_write_ratio: ratio(self.tx_read_write_ratio),
            contract_ratio: ratio(self.tx_contract_ratio),
        }
    }

    pub fn mix_overrides(&self) -> MixOverrides {
        MixOverrides {
            simple_transfer: ratio(self.tx_simple_transfer_ratio),
            erc20_transfer: ratio(self.tx_erc20_transfer_ratio),
            uniswap_swap: ratio(self.tx_uniswap_swap_ratio),
            complex_defi: ratio(self.tx_complex_defi_ratio),
            contract_deploy: ratio(self.tx_contract_deploy_ratio),
        }
    }
}

fn ratio(value: f64) -> Option<f64> {
    (value >= 0.0).then_some(value)
}

fn depth(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

impl RunArgs {
    pub fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            benchmark_id: self.benchmark_id.clone(),
            key_count: self.key_count,
            concurrency: self.concurrency,
            seed: self.seed,
            write_enabled: self.write,
            keys_file: self.keys_file.clone(),
            queue_depth: self.queue_depth,
            mixed_operations: self.mixed_operations,
            dump_keys: self.dump_keys.clone(),
            ..Default::default()
        }
    }

    pub fn workload_config(&self) -> WorkloadConfig {
        let workload = &self.workload;
        let transaction = &self.transaction;
        WorkloadConfig {
            workload_type: workload.workload_type,
            value_size: self.value_size,
            read_ratio: self.read_ratio,
            seed: self.seed,
            recent_block_bias: workload.recent_block_bias,
            hot_account_ratio: workload.hot_account_ratio,
            state_locality: workload.state_locality,
            block_range: workload.block_range,
            account_count: workload.account_count,
            storage_slot_ratio: workload.storage_slot_ratio,
            network_type: transaction.network_type.clone(),
            transaction_mix: transaction.transaction_mix.clone(),
            model_overrides: transaction.model_overrides(),
            mix_overrides: transaction.mix_overrides(),
            tx_per_block: transaction.tx_per_block,
            gas_target_per_block: transaction.gas_target_per_block,
            ..Default::default()
        }
    }

    /// Engines open read-only unless the run writes, in either phase.
    pub fn engine_config(&self) -> EngineConfig {
        let lmdb = &self.lmdb;
        EngineConfig {
            database: self.database,
            path: self.db_path.clone(),
            read_only: !self.write && !self.mixed_operations,
            block_cache_size: self.block_cache_size,
            lmdb: LmdbConfig {
                map_size: usize::try_from(lmdb.map_size).ok(),
                max_dbs: lmdb.max_dbs,
                max_readers: lmdb.max_readers,
                no_sync: lmdb.no_sync,
                no_meta_sync: lmdb.no_meta_sync,
                write_map: lmdb.write_map,
                no_readahead: lmdb.no_readahead,
            },
        }
    }
}
