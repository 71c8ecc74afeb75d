//! Entity records, snapshots and candidate sets.
//!
//! A `Snapshot` is what the store persists for one entity type. A
//! `CandidateSet` is what the extractor produced in the current run, every
//! record stamped with the same `RunTimestamp`. Both keep row order (the
//! change detector compares positionally) and both reject duplicate keys.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};

use crate::consts::DATE_FORMAT;
use crate::error::{Result, SyncError};

/// Single point in time shared by every entity type processed in one invocation.
///
/// Truncated to whole seconds: the on-disk format carries no fractions, and a
/// value that survives a save/load unchanged keeps `Since` comparisons exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunTimestamp(DateTime<Utc>);

impl RunTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// `YYYY-MM-DD HH:MM:SS`
    pub fn format(&self) -> String {
        format_since(&self.0)
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for RunTimestamp {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.format())
    }
}

pub fn format_since(at: &DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// One tracked item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub key: String,
    pub link: Option<String>,
    pub since: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(key: impl Into<String>, link: Option<String>, since: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            link: normalize_link(link),
            since,
        }
    }

    /// Проекция (Key, Link) - именно её сравнивает change detector.
    pub fn key_link(&self) -> (&str, Option<&str>) {
        (self.key.as_str(), self.link.as_deref())
    }
}

/// Empty links are "absent": the CSV form cannot tell them apart.
pub(crate) fn normalize_link(link: Option<String>) -> Option<String> {
    link.filter(|l| !l.trim().is_empty())
}

fn ensure_unique<'a, I>(keys: I, context: &str) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for k in keys {
        if !seen.insert(k) {
            return Err(SyncError::DuplicateKey {
                key: k.to_string(),
                context: context.to_string(),
            });
        }
    }
    Ok(())
}

/// Persisted, reconciled records of one entity type. Row order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    records: Vec<EntityRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<EntityRecord>) -> Result<Self> {
        ensure_unique(records.iter().map(|r| r.key.as_str()), "snapshot")?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EntityRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&EntityRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn earliest_since(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.since).min()
    }

    pub fn latest_since(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.since).max()
    }
}

/// Row of the feed before stamping: key and optional hyperlink target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub key: String,
    pub link: Option<String>,
}

impl FeedRow {
    pub fn new(key: impl Into<String>, link: Option<String>) -> Self {
        Self {
            key: key.into(),
            link: normalize_link(link),
        }
    }
}

/// Freshly fetched records for the current run, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    run_ts: RunTimestamp,
    records: Vec<EntityRecord>,
}

impl CandidateSet {
    /// Stamp every row with `run_ts`. Fails fast on a repeated key.
    pub fn stamp(rows: Vec<FeedRow>, run_ts: RunTimestamp) -> Result<Self> {
        ensure_unique(rows.iter().map(|r| r.key.as_str()), "candidate set")?;
        let since = run_ts.as_datetime();
        let records = rows
            .into_iter()
            .map(|r| EntityRecord {
                key: r.key,
                link: r.link,
                since,
            })
            .collect();
        Ok(Self { run_ts, records })
    }

    pub fn run_timestamp(&self) -> RunTimestamp {
        self.run_ts
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> RunTimestamp {
        RunTimestamp::from_datetime(Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn run_timestamp_drops_subseconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap();
        let rt = RunTimestamp::from_datetime(at);
        assert_eq!(rt.as_datetime().timestamp_subsec_nanos(), 0);
        assert_eq!(rt.format(), "2023-11-14 22:13:20");
    }

    #[test]
    fn candidate_set_stamps_all_rows_with_run_time() {
        let run = ts(1_000);
        let c = CandidateSet::stamp(
            vec![FeedRow::new("A", Some("x".into())), FeedRow::new("B", None)],
            run,
        )
        .unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.records().iter().all(|r| r.since == run.as_datetime()));
    }

    #[test]
    fn candidate_set_rejects_duplicate_keys() {
        let err = CandidateSet::stamp(
            vec![FeedRow::new("A", None), FeedRow::new("A", Some("y".into()))],
            ts(1),
        )
        .unwrap_err();
        match err {
            SyncError::DuplicateKey { key, .. } => assert_eq!(key, "A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_links_are_absent() {
        let row = FeedRow::new("A", Some("   ".into()));
        assert_eq!(row.link, None);
        let rec = EntityRecord::new("A", Some(String::new()), ts(1).as_datetime());
        assert_eq!(rec.key_link(), ("A", None));
    }

    #[test]
    fn snapshot_since_bounds() {
        let s = Snapshot::new(vec![
            EntityRecord::new("A", None, ts(50).as_datetime()),
            EntityRecord::new("B", None, ts(10).as_datetime()),
        ])
        .unwrap();
        assert_eq!(s.earliest_since(), Some(ts(10).as_datetime()));
        assert_eq!(s.latest_since(), Some(ts(50).as_datetime()));
        assert!(Snapshot::new(vec![
            EntityRecord::new("A", None, ts(1).as_datetime()),
            EntityRecord::new("A", None, ts(2).as_datetime()),
        ])
        .is_err());
    }
}
