//! Error kinds raised while syncing one entity type.
//!
//! The coordinator catches every `SyncError` at the entity-type boundary, so a
//! failure here never aborts processing of the remaining entity types.

use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Network/transport failure retrieving the feed.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Feed content cannot be interpreted as tabular records.
    #[error("parse error: {0}")]
    Parse(String),

    /// Snapshot or metadata cannot be read or written.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Stored snapshot exists but its contents are not a valid snapshot.
    #[error("corrupt snapshot {path}: {message}")]
    CorruptSnapshot { path: String, message: String },

    /// Key-uniqueness invariant violated.
    #[error("duplicate key '{key}' in {context}")]
    DuplicateKey { key: String, context: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another run already holds the data directory lock.
    #[error("data directory {0} is locked by another run")]
    Locked(String),
}

/// Coarse classification used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Parse,
    Persistence,
    DuplicateKey,
    Config,
    Locked,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Fetch { .. } => ErrorKind::Fetch,
            SyncError::Parse(_) => ErrorKind::Parse,
            SyncError::Persistence { .. } | SyncError::CorruptSnapshot { .. } => {
                ErrorKind::Persistence
            }
            SyncError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            SyncError::Config(_) => ErrorKind::Config,
            SyncError::Locked(_) => ErrorKind::Locked,
        }
    }

    pub(crate) fn persistence(path: &Path, source: io::Error) -> Self {
        SyncError::Persistence {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, message: impl Into<String>) -> Self {
        SyncError::CorruptSnapshot {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn fetch(url: &str, message: impl ToString) -> Self {
        SyncError::Fetch {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for SyncError {
    fn from(e: zip::result::ZipError) -> Self {
        SyncError::Parse(format!("xlsx container: {e}"))
    }
}

impl From<quick_xml::Error> for SyncError {
    fn from(e: quick_xml::Error) -> Self {
        SyncError::Parse(format!("xlsx xml: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_report_categories() {
        let e = SyncError::fetch("http://x", "boom");
        assert_eq!(e.kind(), ErrorKind::Fetch);
        let e = SyncError::corrupt(Path::new("a.csv"), "bad header");
        assert_eq!(e.kind(), ErrorKind::Persistence);
        let e = SyncError::DuplicateKey {
            key: "A".into(),
            context: "candidate set".into(),
        };
        assert_eq!(e.kind(), ErrorKind::DuplicateKey);
        assert_eq!(e.to_string(), "duplicate key 'A' in candidate set");
    }
}
