//! Snapshot Store: one CSV snapshot per entity type.
//!
//! Файл: <data_dir>/<prefix><entity lowercase>.csv, три колонки в порядке
//! `<EntityType>,Link,Since`. Since пишется как `YYYY-MM-DD HH:MM:SS` (UTC).
//! Пустое поле Link = ссылки нет.
//!
//! Load accepts a few other timestamp spellings for `Since` (RFC 3339,
//! fractional seconds, explicit offsets) and normalizes them to UTC. Save
//! always writes the fixed format and goes through `util::write_atomic`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::debug;

use crate::consts::{DATE_FORMAT, DEFAULT_SNAPSHOT_PREFIX, LINK_COLUMN, SINCE_COLUMN, SNAPSHOT_EXT};
use crate::error::{Result, SyncError};
use crate::model::{format_since, EntityRecord, Snapshot};
use crate::util::write_atomic;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_dir: PathBuf,
    prefix: String,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn snapshot_path(&self, entity: &str) -> PathBuf {
        self.data_dir.join(format!(
            "{}{}.{}",
            self.prefix,
            entity.to_lowercase(),
            SNAPSHOT_EXT
        ))
    }

    /// `Ok(None)` when no snapshot has been written for `entity` yet.
    pub fn load(&self, entity: &str) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(entity);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::persistence(&path, e)),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(file);

        let headers = rdr
            .headers()
            .map_err(|e| csv_error(&path, e))?
            .clone();
        let cols = ColumnMap::resolve(&headers, entity)
            .map_err(|msg| SyncError::corrupt(&path, msg))?;

        let mut records = Vec::new();
        for (i, row) in rdr.records().enumerate() {
            let row = row.map_err(|e| csv_error(&path, e))?;
            let line = i + 2; // 1-based, после заголовка
            let key = row.get(cols.key).unwrap_or_default().to_string();
            let link = row
                .get(cols.link)
                .map(str::to_string)
                .filter(|s| !s.is_empty());
            let since_raw = row.get(cols.since).unwrap_or_default();
            let since = parse_since(since_raw).ok_or_else(|| {
                SyncError::corrupt(
                    &path,
                    format!("line {line}: unparsable {SINCE_COLUMN} '{since_raw}'"),
                )
            })?;
            records.push(EntityRecord::new(key, link, since));
        }

        debug!("store: loaded {} records from {}", records.len(), path.display());
        let snapshot = Snapshot::new(records).map_err(|e| match e {
            SyncError::DuplicateKey { key, .. } => SyncError::DuplicateKey {
                key,
                context: format!("stored snapshot {}", path.display()),
            },
            other => other,
        })?;
        Ok(Some(snapshot))
    }

    /// Replace the snapshot for `entity`. All-or-nothing.
    pub fn save(&self, entity: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(entity);
        write_atomic(&path, |w| {
            let mut wtr = csv::Writer::from_writer(w);
            wtr.write_record([entity, LINK_COLUMN, SINCE_COLUMN])
                .map_err(|e| csv_error(&path, e))?;
            for r in snapshot.records() {
                let since = format_since(&r.since);
                wtr.write_record([r.key.as_str(), r.link.as_deref().unwrap_or(""), since.as_str()])
                    .map_err(|e| csv_error(&path, e))?;
            }
            wtr.flush().map_err(|e| SyncError::persistence(&path, e))?;
            Ok(())
        })?;
        debug!("store: saved {} records to {}", snapshot.len(), path.display());
        Ok(path)
    }
}

/// Позиции канонических колонок в заголовке файла.
struct ColumnMap {
    key: usize,
    link: usize,
    since: usize,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord, entity: &str) -> std::result::Result<Self, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
                .ok_or_else(|| format!("missing column '{name}' (header: {:?})", headers))
        };
        Ok(Self {
            key: find(entity)?,
            link: find(LINK_COLUMN)?,
            since: find(SINCE_COLUMN)?,
        })
    }
}

fn csv_error(path: &Path, e: csv::Error) -> SyncError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => SyncError::persistence(path, io),
            other => SyncError::corrupt(path, format!("{other:?}")),
        }
    } else {
        SyncError::corrupt(path, e.to_string())
    }
}

/// Parse a stored `Since` value into UTC. Naive values are taken as UTC.
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, DATE_FORMAT) {
        return Some(n.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}
