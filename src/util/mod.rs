//! util - общие файловые хелперы.
//!
//! Содержит:
//! - write_atomic(): запись через <file>.tmp + sync_all + rename + fsync каталога.
//! - fsync_dir(): best-effort fsync родительского каталога (unix).
//!
//! Snapshot и metadata пишутся одинаково: читатель видит либо старый файл
//! целиком, либо новый целиком.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Путь временного файла рядом с целевым: `<name>.tmp`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` atomically. `fill` gets a buffered writer over the temp file;
/// on any error the temp file is removed and the old `path` is left untouched.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SyncError::persistence(parent, e))?;
        }
    }

    let tmp = tmp_path_for(path);
    let _ = fs::remove_file(&tmp);

    let res = (|| -> Result<()> {
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| SyncError::persistence(&tmp, e))?;
        let mut w = BufWriter::new(f);
        fill(&mut w)?;
        w.flush().map_err(|e| SyncError::persistence(&tmp, e))?;
        let f = w
            .into_inner()
            .map_err(|e| SyncError::persistence(&tmp, e.into_error()))?;
        f.sync_all().map_err(|e| SyncError::persistence(&tmp, e))?; // tmp на диске
        fs::rename(&tmp, path).map_err(|e| SyncError::persistence(path, e))?;
        Ok(())
    })();

    if res.is_err() {
        let _ = fs::remove_file(&tmp);
        return res;
    }
    let _ = fsync_dir(path);
    Ok(())
}

#[cfg(unix)]
pub fn fsync_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
pub fn fsync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
