use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use heed::{Database as HeedDb, Env, EnvFlags, EnvOpenOptions, types::Bytes};
use parking_lot::RwLock;
use statebench::{Database, DatabaseMetrics, Error, OpCounters};

use crate::{LmdbConfig, disk_size};

const DEFAULT_MAP_SIZE: usize = 100 * 1024 * 1024 * 1024; // 100 GB
const DEFAULT_MAX_DBS: u32 = 2;
const DEFAULT_MAX_READERS: u32 = 128;

type Table = HeedDb<Bytes, Bytes>;

pub struct LmdbDatabase {
    inner: RwLock<Option<(Env, Table)>>,
    path: PathBuf,
    counters: OpCounters,
}

impl LmdbDatabase {
    pub fn open(path: &Path, read_only: bool, config: &LmdbConfig) -> Result<Self> {
        if !read_only {
            fs::create_dir_all(path)?;
        }

        let mut flags = EnvFlags::empty();
        for (enabled, flag) in [
            (config.no_sync, EnvFlags::NO_SYNC),
            (config.no_meta_sync, EnvFlags::NO_META_SYNC),
            (config.write_map, EnvFlags::WRITE_MAP),
            (config.no_readahead, EnvFlags::NO_READ_AHEAD),
            (read_only, EnvFlags::READ_ONLY),
        ] {
            if enabled {
                flags |= flag;
            }
        }

        let max_dbs = match config.max_dbs {
            0 => DEFAULT_MAX_DBS,
            n => n,
        };
        let max_readers = match config.max_readers {
            0 => DEFAULT_MAX_READERS,
            n => n,
        };

        let mut options = EnvOpenOptions::new();
        options
            .map_size(config.map_size.unwrap_or(DEFAULT_MAP_SIZE))
            .max_dbs(max_dbs)
            .max_readers(max_readers);
        let env = unsafe {
            options.flags(flags);
            options.open(path)?
        };

        let table = if read_only {
            let rtxn = env.read_txn()?;
            let table = env
                .open_database(&rtxn, None)?
                .with_context(|| format!("no database in {}", path.display()))?;
            rtxn.commit()?;
            table
        } else {
            let mut wtxn = env.write_txn()?;
            let table = env.create_database(&mut wtxn, None)?;
            wtxn.commit()?;
            table
        };

        Ok(Self {
            inner: RwLock::new(Some((env, table))),
            path: path.to_owned(),
            counters: OpCounters::new(),
        })
    }

    fn with_env<T>(&self, f: impl FnOnce(&Env, Table) -> heed::Result<T>) -> statebench::Result<T> {
        let inner = self.inner.read();
        let (env, table) = inner.as_ref().ok_or(Error::Closed)?;
        f(env, *table).map_err(Error::engine)
    }
}

impl Database for LmdbDatabase {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    /// One write transaction per key.
    fn set(&self, key: &[u8], value: &[u8]) -> statebench::Result<()> {
        self.counters.write(value.len(), || {
            self.with_env(|env, table| {
                let mut wtxn = env.write_txn()?;
                table.put(&mut wtxn, key, value)?;
                wtxn.commit()
            })
        })
    }

    fn get(&self, key: &[u8]) -> statebench::Result<Vec<u8>> {
        self.counters.read(|| {
            self.with_env(|env, table| {
                let rtxn = env.read_txn()?;
                Ok(table.get(&rtxn, key)?.map(<[u8]>::to_vec))
            })?
            .ok_or(Error::NotFound)
        })
    }

    fn flush(&self) -> statebench::Result<()> {
        self.counters
            .flush(|| self.with_env(|env, _| env.force_sync()))
    }

    fn close(&self) -> statebench::Result<()> {
        if let Some((env, _)) = self.inner.write().take() {
            env.prepare_for_closing().wait();
        }
        Ok(())
    }

    fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = self.counters.metrics();

        if let Some((env, table)) = self.inner.read().as_ref() {
            let map_size = env.info().map_size as u64;
            metrics.data_size = disk_size(&self.path).unwrap_or(map_size);
            metrics
                .backend_specific
                .insert("map_size".to_string(), map_size.into());
            if let Ok(rtxn) = env.read_txn()
                && let Ok(len) = table.len(&rtxn)
            {
                metrics.key_count = len;
            }
        }

        metrics
    }
}
