//! Scoped cross-process exclusive locks.
//!
//! A [`ScopedLock`] holds an OS advisory lock on a marker file for as long as
//! the guard lives. The lock is released on drop, on every exit path.
//! Advisory locks are per open file description, so two guards on the same
//! path conflict even inside one process; never nest the same lock.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::error::{Result, TshragError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct ScopedLock {
    file: File,
    path: PathBuf,
}

impl ScopedLock {
    /// Block until the lock on `path` is held or `timeout` elapses.
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match fs2::FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    trace!(path = %path.display(), "lock acquired");
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        return Err(TshragError::LockTimeout {
                            path,
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Single non-blocking attempt; `Ok(None)` when another holder exists.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path, Duration::ZERO) {
            Ok(lock) => Ok(Some(lock)),
            Err(TshragError::LockTimeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == fs2::lock_contended_error().kind()
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn acquire_creates_marker_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/.lock");
        let lock = ScopedLock::acquire(&path, Duration::from_millis(100)).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path.as_path());
    }

    #[test]
    fn second_holder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let _held = ScopedLock::acquire(&path, Duration::from_millis(100)).unwrap();

        let started = Instant::now();
        let err = ScopedLock::acquire(&path, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, TshragError::LockTimeout { timeout_ms: 50, .. }));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(ScopedLock::try_acquire(&path).unwrap().is_none());
    }

    #[test]
    fn released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        {
            let _held = ScopedLock::acquire(&path, Duration::from_millis(100)).unwrap();
        }
        assert!(ScopedLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn waiter_acquires_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let held = ScopedLock::acquire(&path, Duration::from_millis(100)).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let handle = thread::spawn(move || {
            tx.send(()).unwrap();
            ScopedLock::acquire(&waiter_path, Duration::from_secs(5)).is_ok()
        });
        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(30));
        drop(held);
        assert!(handle.join().unwrap());
    }
}
