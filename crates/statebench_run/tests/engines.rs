use std::{fs, path::Path};

use clap::Parser;
use statebench::{Database, Exit};
use statebench_run::{
    Cli, Command, DatabaseType, EngineConfig, LmdbConfig, RunArgs, open, run_benchmark,
};
use tempfile::TempDir;

type Result<T, E = Box<dyn std::error::Error>> = std::result::Result<T, E>;

const KEY_COUNT: u64 = 400;

fn parse(args: &[&str]) -> Result<Box<RunArgs>> {
    let cli = Cli::try_parse_from(["statebench", "run"].iter().chain(args))?;
    let Command::Run(args) = cli.command;
    Ok(args)
}

fn path(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn engine_config(database: DatabaseType, dir: &Path, read_only: bool) -> EngineConfig {
    EngineConfig {
        database,
        path: dir.join("db"),
        read_only,
        block_cache_size: 1 << 20,
        lmdb: LmdbConfig {
            map_size: Some(1 << 30),
            ..Default::default()
        },
    }
}

fn write_then_reopen(database: &str) -> Result<()> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("db");
    let keys = dir.path().join("keys.bin");
    let report = dir.path().join("report.json");
    let key_count = KEY_COUNT.to_string();

    let write = parse(&[
        "--database",
        database,
        "--db-path",
        path(&db_path),
        "--write",
        "--key-count",
        &key_count,
        "--concurrency",
        "4",
        "--workload",
        "pos-accounts",
        "--account-count",
        "1000",
        "--mdbx-map-size",
        "1073741824",
        "--dump-keys",
        path(&keys),
        "--report",
        path(&report),
    ])?;
    let summary = run_benchmark(&write, Exit::new())?;
    assert_eq!(summary.database, database);
    let written = summary.write.as_ref().expect("write phase");
    assert_eq!(written.counters.successful_writes, KEY_COUNT);
    assert_eq!(summary.read.counters.successful_reads, KEY_COUNT);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report)?)?;
    assert_eq!(json["database"], database);
    assert_eq!(json["workload"], "pos-accounts");
    assert_eq!(json["read"]["counters"]["reads"], KEY_COUNT);

    let read = parse(&[
        "--database",
        database,
        "--db-path",
        path(&db_path),
        "--keys-file",
        path(&keys),
        "--workload",
        "pos-accounts",
        "--concurrency",
        "2",
        "--mdbx-map-size",
        "1073741824",
    ])?;
    assert!(read.engine_config().read_only);
    let summary = run_benchmark(&read, Exit::new())?;
    assert!(summary.write.is_none());
    assert_eq!(summary.read.counters.reads, KEY_COUNT);
    assert_eq!(summary.read.counters.successful_reads, KEY_COUNT);
    assert_eq!(summary.read.counters.not_found, 0);
    assert_eq!(summary.read.counters.failed_reads, 0);
    Ok(())
}

#[test]
fn test_memory_run_writes_report() -> Result<()> {
    let dir = TempDir::new()?;
    let report = dir.path().join("report.json");
    let args = parse(&[
        "--database",
        "memory",
        "--write",
        "--key-count",
        "250",
        "--workload",
        "transaction-execution",
        "--account-count",
        "500",
        "--report",
        path(&report),
    ])?;

    let summary = run_benchmark(&args, Exit::new())?;
    assert_eq!(summary.read.counters.reads, 250);
    assert_eq!(summary.read.counters.not_found, 0);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report)?)?;
    assert_eq!(json["database"], "memory");
    assert_eq!(
        json["workload_config"]["workload_type"],
        "transaction-execution"
    );
    Ok(())
}

#[test]
fn test_rocksdb_write_then_reopen() -> Result<()> {
    write_then_reopen("rocksdb")
}

#[test]
fn test_lmdb_write_then_reopen() -> Result<()> {
    write_then_reopen("lmdb")
}

#[test]
fn test_redb_write_then_reopen() -> Result<()> {
    write_then_reopen("redb")
}

#[test]
fn test_fjall_write_then_reopen() -> Result<()> {
    write_then_reopen("fjall")
}

#[test]
fn test_engines_share_the_port_semantics() -> Result<()> {
    for database in [
        DatabaseType::Memory,
        DatabaseType::Rocksdb,
        DatabaseType::Lmdb,
        DatabaseType::Redb,
        DatabaseType::Fjall,
    ] {
        let dir = TempDir::new()?;
        let db = open(&engine_config(database, dir.path(), false))?;
        assert_eq!(db.name(), database.to_string());

        assert!(db.get(b"absent").is_err_and(|e| e.is_not_found()), "{database}");
        db.set(b"key", b"value")?;
        db.set(b"key", b"other")?;
        assert_eq!(db.get(b"key")?, b"other", "{database}");
        db.flush()?;

        let metrics = db.metrics();
        assert_eq!(metrics.write_count, 2, "{database}");
        assert_eq!(metrics.read_count, 2, "{database}");
        assert_eq!(metrics.read_errors, 0, "{database}");
        assert_eq!(metrics.flush_count, 1, "{database}");

        db.close()?;
        assert!(
            matches!(db.get(b"key"), Err(statebench::Error::Closed)),
            "{database}"
        );
        assert!(db.close().is_ok(), "{database}");
    }
    Ok(())
}

#[test]
fn test_missing_database_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    for database in [
        DatabaseType::Rocksdb,
        DatabaseType::Lmdb,
        DatabaseType::Redb,
        DatabaseType::Fjall,
    ] {
        let config = engine_config(database, dir.path(), true);
        assert!(open(&config).is_err(), "{database}");
    }
    Ok(())
}

#[test]
fn test_missing_keys_file_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let args = parse(&[
        "--database",
        "memory",
        "--keys-file",
        path(&dir.path().join("keys.bin")),
    ])?;
    assert!(run_benchmark(&args, Exit::new()).is_err());
    Ok(())
}
