//! Scoped temporary download of the feed workbook.
//!
//! `TempDownload` owns the file from the moment it is created: dropping the
//! guard removes it, on the success path and on every error path alike.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::consts::MAX_DOWNLOAD_BYTES;
use crate::error::{Result, SyncError};

pub struct TempDownload {
    path: PathBuf,
    bytes: u64,
}

impl TempDownload {
    /// Create (truncate) `path` and hand out the guard plus a writable handle.
    pub fn create(path: &Path) -> Result<(Self, File)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SyncError::persistence(parent, e))?;
            }
        }
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| SyncError::persistence(path, e))?;
        Ok((
            Self {
                path: path.to_path_buf(),
                bytes: 0,
            },
            f,
        ))
    }

    /// GET `url` into `path`. Non-2xx status, transport errors and bodies over
    /// `MAX_DOWNLOAD_BYTES` are `Fetch` errors.
    pub fn fetch(url: &str, path: &Path, timeout: Duration) -> Result<Self> {
        let (mut guard, mut file) = Self::create(path)?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let mut resp = agent.get(url).call().map_err(|e| SyncError::fetch(url, e))?;
        let mut body = resp
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_BYTES)
            .reader();
        guard.bytes = io::copy(&mut body, &mut file).map_err(|e| SyncError::fetch(url, e))?;
        file.flush().map_err(|e| SyncError::persistence(path, e))?;

        debug!("download: {} bytes from {} -> {}", guard.bytes, url, path.display());
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("download: removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("download: failed to remove {}: {}", self.path.display(), e),
        }
    }
}
