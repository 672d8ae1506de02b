use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use parking_lot::RwLock;
use rocksdb::{BlockBasedOptions, Cache, DB, Options, WriteOptions};
use statebench::{Database, DatabaseMetrics, Error, OpCounters};

use crate::disk_size;

pub struct RocksDbDatabase {
    db: RwLock<Option<DB>>,
    cache: Option<Cache>,
    write_options: WriteOptions,
    read_only: bool,
    path: PathBuf,
    counters: OpCounters,
}

impl RocksDbDatabase {
    pub fn open(path: &Path, read_only: bool, block_cache_size: i64) -> Result<Self> {
        let mut block_options = BlockBasedOptions::default();
        let cache = if block_cache_size >= 0 {
            let cache = Cache::new_lru_cache(block_cache_size as usize);
            block_options.set_block_cache(&cache);
            Some(cache)
        } else {
            block_options.disable_cache();
            None
        };

        let mut opts = Options::default();
        opts.create_if_missing(!read_only);
        opts.set_block_based_table_factory(&block_options);

        let db = if read_only {
            DB::open_for_read_only(&opts, path, false)?
        } else {
            fs::create_dir_all(path)?;
            DB::open(&opts, path)?
        };

        // Durability comes from the explicit flush at the end of the write phase.
        let mut write_options = WriteOptions::default();
        write_options.disable_wal(true);

        Ok(Self {
            db: RwLock::new(Some(db)),
            cache,
            write_options,
            read_only,
            path: path.to_owned(),
            counters: OpCounters::new(),
        })
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&DB) -> Result<T, rocksdb::Error>,
    ) -> statebench::Result<T> {
        let db = self.db.read();
        let db = db.as_ref().ok_or(Error::Closed)?;
        f(db).map_err(Error::engine)
    }
}

impl Database for RocksDbDatabase {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    fn set(&self, key: &[u8], value: &[u8]) -> statebench::Result<()> {
        self.counters.write(value.len(), || {
            self.with_db(|db| db.put_opt(key, value, &self.write_options))
        })
    }

    fn get(&self, key: &[u8]) -> statebench::Result<Vec<u8>> {
        self.counters
            .read(|| self.with_db(|db| db.get(key))?.ok_or(Error::NotFound))
    }

    fn flush(&self) -> statebench::Result<()> {
        self.counters.flush(|| self.with_db(|db| db.flush()))
    }

    fn close(&self) -> statebench::Result<()> {
        let Some(db) = self.db.write().take() else {
            return Ok(());
        };
        if !self.read_only {
            db.flush().map_err(Error::engine)?;
        }
        Ok(())
    }

    fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = self.counters.metrics();

        if let Some(db) = self.db.read().as_ref() {
            let property = |name: &str| db.property_int_value(name).ok().flatten().unwrap_or(0);
            metrics.key_count = property("rocksdb.estimate-num-keys");
            metrics.mem_table_size = property("rocksdb.cur-size-all-mem-tables");
            metrics.data_size = property("rocksdb.total-sst-files-size");
            metrics.compaction_ops = property("rocksdb.num-running-compactions");
            metrics.backend_specific.insert(
                "estimate_live_data_size".to_string(),
                property("rocksdb.estimate-live-data-size").into(),
            );
            metrics.backend_specific.insert(
                "num_immutable_mem_tables".to_string(),
                property("rocksdb.num-immutable-mem-table").into(),
            );
        }
        if let Some(cache) = &self.cache {
            metrics.cache_size = cache.get_usage() as u64;
        }
        metrics.backend_specific.insert(
            "disk_size".to_string(),
            disk_size(&self.path).unwrap_or(0).into(),
        );

        metrics
    }
}
