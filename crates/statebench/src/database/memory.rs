use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::RwLock;

use crate::{Database, DatabaseMetrics, Error, OpCounters, Result};

/// In-process engine backed by a locked hash map.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    map: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
    counters: OpCounters,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.counters.write(value.len(), || {
            self.check_open()?;
            self.map.write().insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.counters.read(|| {
            self.check_open()?;
            self.map.read().get(key).cloned().ok_or(Error::NotFound)
        })
    }

    fn flush(&self) -> Result<()> {
        self.counters.flush(|| self.check_open())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn metrics(&self) -> DatabaseMetrics {
        let mut metrics = self.counters.metrics();
        let map = self.map.read();
        metrics.key_count = map.len() as u64;
        metrics.data_size = map.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
        metrics
    }
}
