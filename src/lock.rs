//! # Configuration Lock
//!
//! All configuration transactions in a process are serialized by one
//! [`ProcessLock`]. Acquisition blocks until the lock is free or the
//! caller's remaining deadline runs out; release happens when the returned
//! guard is dropped, whichever way the transaction ends.
//!
//! Deployments with several processes on one host can additionally name a
//! lock file. [`FileLock`] takes an exclusive advisory lock on it, polling
//! until the same deadline.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

const FILE_LOCK_POLL: Duration = Duration::from_millis(25);

/// Blocking mutual exclusion with a bounded wait.
#[derive(Debug, Default)]
pub struct ProcessLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Proof of holding a [`ProcessLock`]; releases it on drop.
#[derive(Debug)]
pub struct ProcessLockGuard<'a> {
    lock: &'a ProcessLock,
}

impl ProcessLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock shared by every coordinator in this process.
    pub fn global() -> Arc<ProcessLock> {
        static GLOBAL: OnceLock<Arc<ProcessLock>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ProcessLock::new())))
    }

    /// Wait at most `timeout` for the lock.
    pub fn acquire(&self, timeout: Duration) -> Result<ProcessLockGuard<'_>> {
        let started = Instant::now();
        let held = self.state();
        let (mut held, wait) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if wait.timed_out() && *held {
            return Err(Error::LockTimeout {
                waited: started.elapsed(),
            });
        }

        *held = true;
        debug!("config lock acquired after {:?}", started.elapsed());
        Ok(ProcessLockGuard { lock: self })
    }

    /// Whether some guard currently holds the lock.
    pub fn is_held(&self) -> bool {
        *self.state()
    }

    // The flag is only touched under the mutex for a few instructions, so a
    // poisoned mutex still holds a consistent value.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProcessLockGuard<'_> {
    fn drop(&mut self) {
        *self.lock.state() = false;
        self.lock.released.notify_one();
        debug!("config lock released");
    }
}

/// Exclusive advisory lock on a file, held until drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Poll for an exclusive lock on `path` until `timeout` elapses. The
    /// file is created when missing.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!("lock file {} acquired", path.display());
                    return Ok(Self { file });
                }
                Err(TryLockError::WouldBlock) => {
                    if started.elapsed() >= timeout {
                        return Err(Error::LockTimeout {
                            waited: started.elapsed(),
                        });
                    }
                    let left = timeout.saturating_sub(started.elapsed());
                    thread::sleep(FILE_LOCK_POLL.min(left));
                }
                Err(TryLockError::Error(e)) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
