//! File-based run lock on the data directory.
//!
//! Cross-platform (fs2) advisory lock, exclusive and non-blocking: a second
//! run against the same data directory fails with `SyncError::Locked` instead
//! of interleaving snapshot writes.
//!
//! Lock file path: <data_dir>/LOCK
//! Lock is released on Drop.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;

use crate::consts::LOCK_FILE;
use crate::error::{Result, SyncError};

pub struct RunLock {
    file: std::fs::File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // ошибки unlock на drop игнорируем
        let _ = self.file.unlock();
        debug!("lock: released {}", self.path.display());
    }
}

pub fn lock_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_FILE)
}

/// Try to take the exclusive run lock. Creates `data_dir` if needed.
pub fn try_lock_data_dir(data_dir: &Path) -> Result<RunLock> {
    fs::create_dir_all(data_dir).map_err(|e| SyncError::persistence(data_dir, e))?;
    let path = lock_file_path(data_dir);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| SyncError::persistence(&path, e))?;
    if file.try_lock_exclusive().is_err() {
        return Err(SyncError::Locked(data_dir.display().to_string()));
    }
    debug!("lock: acquired {}", path.display());
    Ok(RunLock { file, path })
}
