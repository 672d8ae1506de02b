use std::path::Path;

use anyhow::{Result, bail};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use parking_lot::RwLock;
use statebench::{Database, DatabaseMetrics, Error, OpCounters};

const PARTITION: &str = "state";

pub struct FjallDatabase {
    inner: RwLock<Option<(Keyspace, PartitionHandle)>>,
    counters: OpCounters,
}

impl FjallDatabase {
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        // fjall has no read-only mode, refuse to create an empty keyspace instead.
        if read_only && !path.exists() {
            bail!("no fjall keyspace at {}", path.display());
        }

        let keyspace = Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            inner: RwLock::new(Some((keyspace, partition))),
            counters: OpCounters::new(),
        })
    }

    fn with_partition<T>(
        &self,
        f: impl FnOnce(&Keyspace, &PartitionHandle) -> fjall::Result<T>,
    ) -> statebench::Result<T> {
        let inner = self.inner.read();
        let (keyspace, partition) = inner.as_ref().ok_or(Error::Closed)?;
        f(keyspace, partition).map_err(Error::engine)
    }
}

impl Database for FjallDatabase {
    fn name(&self) -> &'static str {
        "fjall"
    }

    fn set(&self, key: &[u8], value: &[u8]) -> statebench::Result<()> {
        self.counters.write(value.len(), || {
            self.with_partition(|_, partition| partition.insert(key, value))
        })
    }

    fn get(&self, key: &[u8]) -> statebench::Result<Vec<u8>> {
        self.counters.read(|| {
            self.with_partition(|_, partition| partition.get(key))?
                .map(|value| value.to_vec())
                .ok_or(Error::NotFound)
        })
    }

    fn flush(&self) -> statebench::Result<()> {
        self.counters.flush(|| {
            self.with_partition(|keyspace, _| keyspace.persist(PersistMode::SyncAll))
        })
    }

    fn close(&self) -> statebench::Result<()> {
        if let Some((keyspace, _)) = self.inner.write().take() {
            keyspace
                .persist(PersistMode::SyncAll)
                .map_err(Error::engine)?;
        }
        Ok(())
    }

    fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = self.counters.metrics();

        if let Some((keyspace, partition)) = self.inner.read().as_ref() {
            metrics.data_size = keyspace.disk_space();
            metrics.key_count = partition.approximate_len() as u64;
            metrics.backend_specific.insert(
                "partition_disk_space".to_string(),
                partition.disk_space().into(),
            );
        }

        metrics
    }
}
