//! Change detector: is the fresh candidate set different from the stored snapshot?
//!
//! Сравниваются только колонки (Key, Link). `Since` не участвует: у кандидата он
//! всегда равен времени текущего запуска.
//!
//! Default strategy is `OrderSensitive`: rows are compared position by
//! position, so a feed that only reorders identical rows still counts as a
//! change and triggers a rewrite. `SetEquality` ignores order; switching to it
//! lowers update frequency and therefore changes observable behavior.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SyncError;
use crate::model::{CandidateSet, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Element-wise equality in current row order (row count must match too).
    #[default]
    OrderSensitive,
    /// Equality of the (Key, Link) sets, row order ignored.
    SetEquality,
}

impl Comparison {
    /// No stored snapshot always reports a change.
    pub fn has_changed(&self, stored: Option<&Snapshot>, candidate: &CandidateSet) -> bool {
        let Some(stored) = stored else {
            return true;
        };
        let old = stored.records().iter().map(|r| r.key_link());
        let new = candidate.records().iter().map(|r| r.key_link());
        match self {
            Comparison::OrderSensitive => !old.eq(new),
            Comparison::SetEquality => {
                if stored.len() != candidate.len() {
                    return true;
                }
                old.collect::<BTreeSet<_>>() != new.collect::<BTreeSet<_>>()
            }
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::OrderSensitive => f.write_str("ordered"),
            Comparison::SetEquality => f.write_str("set"),
        }
    }
}

impl FromStr for Comparison {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" | "order" | "positional" => Ok(Comparison::OrderSensitive),
            "set" | "unordered" => Ok(Comparison::SetEquality),
            other => Err(SyncError::Config(format!(
                "unknown comparison '{other}' (expected 'ordered' or 'set')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityRecord, FeedRow, RunTimestamp};
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> RunTimestamp {
        RunTimestamp::from_datetime(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn stored(rows: &[(&str, Option<&str>)]) -> Snapshot {
        Snapshot::new(
            rows.iter()
                .map(|(k, l)| EntityRecord::new(*k, l.map(String::from), t(100).as_datetime()))
                .collect(),
        )
        .unwrap()
    }

    fn candidate(rows: &[(&str, Option<&str>)]) -> CandidateSet {
        CandidateSet::stamp(
            rows.iter()
                .map(|(k, l)| FeedRow::new(*k, l.map(String::from)))
                .collect(),
            t(200),
        )
        .unwrap()
    }

    #[test]
    fn missing_snapshot_is_always_a_change() {
        let c = candidate(&[("A", Some("x"))]);
        assert!(Comparison::OrderSensitive.has_changed(None, &c));
        assert!(Comparison::SetEquality.has_changed(None, &c));
    }

    #[test]
    fn same_rows_same_order_ignore_since() {
        let s = stored(&[("A", Some("x")), ("B", None)]);
        let c = candidate(&[("A", Some("x")), ("B", None)]);
        assert!(!Comparison::OrderSensitive.has_changed(Some(&s), &c));
    }

    #[test]
    fn reorder_is_a_change_only_for_ordered_strategy() {
        let s = stored(&[("A", Some("x")), ("B", Some("y"))]);
        let c = candidate(&[("B", Some("y")), ("A", Some("x"))]);
        assert!(Comparison::OrderSensitive.has_changed(Some(&s), &c));
        assert!(!Comparison::SetEquality.has_changed(Some(&s), &c));
    }

    #[test]
    fn link_or_count_difference_is_a_change() {
        let s = stored(&[("A", Some("x"))]);
        assert!(Comparison::OrderSensitive.has_changed(Some(&s), &candidate(&[("A", Some("y"))])));
        assert!(Comparison::OrderSensitive.has_changed(Some(&s), &candidate(&[("A", None)])));
        assert!(Comparison::OrderSensitive
            .has_changed(Some(&s), &candidate(&[("A", Some("x")), ("B", None)])));
        assert!(Comparison::SetEquality
            .has_changed(Some(&s), &candidate(&[("A", Some("x")), ("B", None)])));
    }

    #[test]
    fn parse_strategy_names() {
        assert_eq!("ordered".parse::<Comparison>().unwrap(), Comparison::OrderSensitive);
        assert_eq!(" SET ".parse::<Comparison>().unwrap(), Comparison::SetEquality);
        assert!("fuzzy".parse::<Comparison>().is_err());
    }
}
