use std::{
    process::exit,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{info, warn};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::{Error, Result};

/// Stop coordinator for a benchmark run.
///
/// The first Ctrl-C raises the stop flag: producers stop enqueueing keys, workers drain what
/// is already queued and the run reports normally. A second Ctrl-C exits the process, after
/// waiting for any section holding [`Exit::lock`] (a flush, a close) to finish.
#[derive(Default, Clone)]
pub struct Exit {
    stopped: Arc<AtomicBool>,
    lock: Arc<RwLock<()>>,
}

impl Exit {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Only one handler throughout the program (and among all crates) can be set at once
    ///
    pub fn set_ctrlc_handler(&self) -> Result<()> {
        let stopped = self.stopped.clone();
        let lock = self.lock.clone();

        ctrlc::set_handler(move || {
            if !stopped.swap(true, Ordering::SeqCst) {
                warn!("Stopping, draining queued keys (press Ctrl-C again to exit)");
                return;
            }

            if lock.is_locked() {
                info!("Waiting to exit safely...");
            }
            let _lock = lock.write();

            info!("Exiting...");
            exit(130);
        })
        .map_err(|e| Error::String(format!("couldn't set Ctrl-C handler: {e}")))
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub fn lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }
}
