use clap::Parser;
use statebench::{ModelOverrides, TransactionMixConfig, WorkloadType};
use statebench_run::{Cli, Command, DatabaseType, LogFormat, RunArgs};

type Result<T, E = Box<dyn std::error::Error>> = std::result::Result<T, E>;

fn parse(args: &[&str]) -> Result<Box<RunArgs>> {
    let cli = Cli::try_parse_from(["statebench", "run"].iter().chain(args))?;
    let Command::Run(args) = cli.command;
    Ok(args)
}

#[test]
fn test_defaults() -> Result<()> {
    let args = parse(&[])?;
    assert_eq!(args.key_count, 1_000_000);
    assert_eq!(args.read_ratio, 0.7);
    assert_eq!(args.value_size, 256);
    assert_eq!(args.seed, 42);
    assert_eq!(args.concurrency, 1);
    assert_eq!(args.block_cache_size, 8 << 20);
    assert_eq!(args.database, DatabaseType::Rocksdb);
    assert_eq!(args.log_format, LogFormat::Console);
    assert!(!args.write);

    let workload = args.workload_config();
    assert_eq!(workload.workload_type, WorkloadType::Generic);
    assert_eq!(workload.account_count, 100_000);
    assert_eq!(workload.tx_per_block, 100);
    assert_eq!(workload.gas_target_per_block, 15_000_000);
    assert!(workload.mix_overrides.is_empty());
    assert_eq!(workload.model_overrides, ModelOverrides::default());

    let engine = args.engine_config();
    assert!(engine.read_only);
    assert_eq!(engine.lmdb.map_size, None);

    let bench = args.bench_config();
    assert_eq!(bench.benchmark_id, "default");
    assert_eq!(bench.queue_depth, None);
    assert!(bench.keys_file.is_none());
    Ok(())
}

#[test]
fn test_negative_values_and_sentinels() -> Result<()> {
    let args = parse(&[
        "--block-cache-size",
        "-1",
        "--tx-cache-hit-ratio",
        "0.5",
        "--tx-account-trie-depth",
        "9",
        "--tx-storage-trie-depth",
        "-1",
        "--tx-erc20-transfer-ratio",
        "0.25",
        "--mdbx-map-size",
        "1073741824",
    ])?;
    assert_eq!(args.block_cache_size, -1);

    let workload = args.workload_config();
    assert_eq!(workload.model_overrides.cache_hit_ratio, Some(0.5));
    assert_eq!(workload.model_overrides.account_trie_depth, Some(9));
    assert_eq!(workload.model_overrides.storage_trie_depth, None);
    assert_eq!(workload.model_overrides.hot_account_probability, None);
    assert_eq!(workload.mix_overrides.erc20_transfer, Some(0.25));
    assert_eq!(workload.mix_overrides.simple_transfer, None);

    assert_eq!(args.engine_config().lmdb.map_size, Some(1 << 30));
    Ok(())
}

#[test]
fn test_workload_and_engine_selection() -> Result<()> {
    let args = parse(&[
        "--workload",
        "transaction-execution",
        "--database",
        "mdbx",
        "--network-type",
        "polygon",
        "--transaction-mix",
        "defi-heavy",
        "--write",
        "--concurrency",
        "8",
        "--queue-depth",
        "64",
    ])?;
    assert_eq!(args.database, DatabaseType::Lmdb);

    let workload = args.workload_config();
    assert_eq!(workload.workload_type, WorkloadType::TransactionExecution);
    assert_eq!(
        TransactionMixConfig::for_name(&workload.transaction_mix),
        TransactionMixConfig::DEFI_HEAVY
    );
    assert_eq!(workload.network_type, "polygon");

    let bench = args.bench_config();
    assert!(bench.write_enabled);
    assert_eq!(bench.workers(), 8);
    assert_eq!(bench.queue_capacity(), 64);
    assert!(!args.engine_config().read_only);

    assert_eq!(parse(&["--database", "pebble"])?.database, DatabaseType::Rocksdb);
    Ok(())
}

#[test]
fn test_mixed_operations_open_writable() -> Result<()> {
    let args = parse(&["--mixed-operations"])?;
    assert!(args.bench_config().mixed_operations);
    assert!(!args.engine_config().read_only);
    Ok(())
}

#[test]
fn test_invalid_flags_are_rejected() -> Result<()> {
    assert!(parse(&["--workload", "pos-everything"]).is_err());
    assert!(parse(&["--database", "leveldb"]).is_err());
    assert!(parse(&["--log-format", "xml"]).is_err());
    assert!(parse(&["--key-count", "-5"]).is_err());
    Ok(())
}
