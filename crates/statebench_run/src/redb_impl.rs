use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use parking_lot::RwLock;
use redb::{
    Builder, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
};
use statebench::{Database, DatabaseMetrics, Error, OpCounters};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("state");
const FILE_NAME: &str = "state.redb";

pub struct RedbDatabase {
    db: RwLock<Option<redb::Database>>,
    file: PathBuf,
    counters: OpCounters,
}

impl RedbDatabase {
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = path.join(FILE_NAME);
        let db = if read_only {
            redb::Database::open(&file)?
        } else {
            fs::create_dir_all(path)?;
            let db = Builder::new().create(&file)?;
            let write_txn = db.begin_write()?;
            write_txn.open_table(TABLE)?;
            write_txn.commit()?;
            db
        };

        Ok(Self {
            db: RwLock::new(Some(db)),
            file,
            counters: OpCounters::new(),
        })
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&redb::Database) -> Result<T, redb::Error>,
    ) -> statebench::Result<T> {
        let db = self.db.read();
        let db = db.as_ref().ok_or(Error::Closed)?;
        f(db).map_err(Error::engine)
    }
}

impl Database for RedbDatabase {
    fn name(&self) -> &'static str {
        "redb"
    }

    /// One committed write transaction per key.
    fn set(&self, key: &[u8], value: &[u8]) -> statebench::Result<()> {
        self.counters.write(value.len(), || {
            self.with_db(|db| {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(TABLE)?;
                    table.insert(key, value)?;
                }
                write_txn.commit()?;
                Ok(())
            })
        })
    }

    fn get(&self, key: &[u8]) -> statebench::Result<Vec<u8>> {
        self.counters.read(|| {
            self.with_db(|db| {
                let read_txn = db.begin_read()?;
                let table = match read_txn.open_table(TABLE) {
                    Ok(table) => table,
                    Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                Ok(table.get(key)?.map(|value| value.value().to_vec()))
            })?
            .ok_or(Error::NotFound)
        })
    }

    fn flush(&self) -> statebench::Result<()> {
        // Commits are durable
        self.counters.flush(|| self.with_db(|_| Ok(())))
    }

    fn close(&self) -> statebench::Result<()> {
        self.db.write().take();
        Ok(())
    }

    fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = self.counters.metrics();

        if let Some(db) = self.db.read().as_ref()
            && let Ok(read_txn) = db.begin_read()
            && let Ok(table) = read_txn.open_table(TABLE)
            && let Ok(len) = table.len()
        {
            metrics.key_count = len;
        }
        if let Ok(meta) = fs::metadata(&self.file) {
            metrics.data_size = meta.len();
        }

        metrics
    }
}
