use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::ValueEnum;
use log::info;
use statebench::{Database, MemoryDatabase};

use crate::{FjallDatabase, LmdbDatabase, RedbDatabase, RocksDbDatabase};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseType {
    Memory,
    #[default]
    #[value(alias = "pebble")]
    Rocksdb,
    #[value(alias = "mdbx")]
    Lmdb,
    Redb,
    Fjall,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Rocksdb => "rocksdb",
            Self::Lmdb => "lmdb",
            Self::Redb => "redb",
            Self::Fjall => "fjall",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LmdbConfig {
    /// Default when absent
    pub map_size: Option<usize>,
    /// 0 for default
    pub max_dbs: u32,
    /// 0 for default
    pub max_readers: u32,
    pub no_sync: bool,
    pub no_meta_sync: bool,
    pub write_map: bool,
    pub no_readahead: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database: DatabaseType,
    pub path: PathBuf,
    pub read_only: bool,
    /// Negative disables the RocksDB block cache
    pub block_cache_size: i64,
    pub lmdb: LmdbConfig,
}

pub fn open(config: &EngineConfig) -> Result<Box<dyn Database>> {
    info!(
        "Opening {} at {}{}",
        config.database,
        config.path.display(),
        if config.read_only { " (read-only)" } else { "" }
    );

    let path = config.path.as_path();
    let db: Box<dyn Database> = match config.database {
        DatabaseType::Memory => Box::new(MemoryDatabase::new()),
        DatabaseType::Rocksdb => Box::new(RocksDbDatabase::open(
            path,
            config.read_only,
            config.block_cache_size,
        )?),
        DatabaseType::Lmdb => Box::new(LmdbDatabase::open(path, config.read_only, &config.lmdb)?),
        DatabaseType::Redb => Box::new(RedbDatabase::open(path, config.read_only)?),
        DatabaseType::Fjall => Box::new(FjallDatabase::open(path, config.read_only)?),
    };
    Ok(db)
}

/// Total size of the files under `path`
pub fn disk_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }

    let mut total_size = 0u64;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total_size += entry.metadata()?.len();
        }
    }

    Ok(total_size)
}
