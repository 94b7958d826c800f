//! Exclusive lock file next to the database.

use crate::constants::LOCK_FILE_EXTENSION;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Lock file content, for finding the holder.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock.
    pub pid: u32,
    /// Hostname of the machine.
    pub hostname: String,
    /// When the lock was acquired.
    pub started: DateTime<Utc>,
    /// Database the lock protects.
    pub database: PathBuf,
}

/// RAII guard making this process the only writer of a database.
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    /// Take the lock for `database`.
    ///
    /// With `stale_after`, an existing lock file older than that is removed
    /// first (left behind by a crashed run).
    pub fn acquire(database: &Path, stale_after: Option<Duration>) -> Result<Self> {
        let lock_path = Self::lock_path_for(database);

        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::LockCreate {
                path: lock_path.clone(),
                source: e,
            })?;
        }

        if let Some(max_age) = stale_after
            && Self::is_stale(&lock_path, max_age)
        {
            warn!("Removing stale lock {}", lock_path.display());
            fs::remove_file(&lock_path).map_err(|e| Error::LockRemove {
                path: lock_path.clone(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);

        match file {
            Ok(mut f) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    hostname: hostname::get().map_or_else(
                        |_| "unknown".to_string(),
                        |h| h.to_string_lossy().into_owned(),
                    ),
                    started: Utc::now(),
                    database: database.to_path_buf(),
                };

                let json = serde_json::to_string_pretty(&info).unwrap_or_else(|_| "{}".to_string());
                if let Err(e) = f.write_all(json.as_bytes()) {
                    debug!("Could not write lock info to {}: {e}", lock_path.display());
                }

                register_lock(&lock_path);
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::StoreLocked { path: lock_path })
            }
            Err(e) => Err(Error::LockCreate {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// Lock file path for a database: `<db><LOCK_FILE_EXTENSION>`.
    pub fn lock_path_for(database: &Path) -> PathBuf {
        let mut name = database.as_os_str().to_owned();
        name.push(LOCK_FILE_EXTENSION);
        PathBuf::from(name)
    }

    /// Read the holder information of an existing lock.
    pub fn holder(database: &Path) -> Option<LockInfo> {
        let contents = fs::read_to_string(Self::lock_path_for(database)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn is_stale(lock_path: &Path, max_age: Duration) -> bool {
        if let Ok(metadata) = fs::metadata(lock_path)
            && let Ok(modified) = metadata.modified()
        {
            return modified.elapsed().unwrap_or_default() > max_age;
        }
        false
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        unregister_lock(&self.lock_path);
    }
}

/// Lock paths held by this process, removed on Ctrl+C.
static ACTIVE_LOCKS: LazyLock<Mutex<Vec<PathBuf>>> = LazyLock::new(|| Mutex::new(Vec::new()));

fn register_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.push(path.to_path_buf());
    }
}

fn unregister_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.retain(|p| p != path);
    }
}

/// Remove every lock held by this process. Called on signal.
pub fn cleanup_all_locks() {
    if let Ok(locks) = ACTIVE_LOCKS.lock() {
        for lock_path in locks.iter() {
            let _ = fs::remove_file(lock_path);
        }
    }
}
