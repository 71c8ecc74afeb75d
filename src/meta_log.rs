//! meta_log - JSON-файл с датой последнего обновления snapshot'а.
//!
//! Путь: <meta_dir>/<entity lowercase>s_latest_date.json, содержимое
//! (pretty JSON, файл перезаписывается целиком):
//!   { "name": "Journal", "latest_date": "2024-03-01 12:30:00" }
//!
//! Пишется только после успешного save() snapshot'а.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::consts::META_FILE_SUFFIX;
use crate::error::{Result, SyncError};
use crate::model::RunTimestamp;
use crate::util::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestDate {
    pub name: String,
    pub latest_date: String,
}

#[derive(Debug, Clone)]
pub struct MetaLog {
    meta_dir: PathBuf,
}

impl MetaLog {
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
        }
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.meta_dir
            .join(format!("{}{}", entity.to_lowercase(), META_FILE_SUFFIX))
    }

    /// Overwrite the record for `entity` with `latest_date = run_ts`.
    pub fn record_update(&self, entity: &str, run_ts: RunTimestamp) -> Result<PathBuf> {
        let path = self.path_for(entity);
        let rec = LatestDate {
            name: entity.to_string(),
            latest_date: run_ts.format(),
        };
        write_atomic(&path, |w| {
            serde_json::to_writer_pretty(&mut *w, &rec)
                .map_err(|e| SyncError::persistence(&path, io::Error::from(e)))?;
            w.write_all(b"\n")
                .map_err(|e| SyncError::persistence(&path, e))
        })?;
        info!(
            "meta: updated datetime for {} in file {} to {}",
            entity,
            path.display(),
            rec.latest_date
        );
        Ok(path)
    }

    /// `Ok(None)` if nothing has been logged for `entity` yet.
    pub fn read(&self, entity: &str) -> Result<Option<LatestDate>> {
        let path = self.path_for(entity);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::persistence(&path, e)),
        };
        let rec = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::corrupt(&path, e.to_string()))?;
        Ok(Some(rec))
    }
}
