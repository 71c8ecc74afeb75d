//! Reconciler: merge a candidate set onto the stored snapshot.
//!
//! Правила слияния:
//! - left join candidate -> stored по Key: порядок и состав строк задаёт кандидат;
//!   ключи, которых нет в кандидате, из результата выпадают;
//! - Since = min(stored.Since, run_ts); новый ключ получает run_ts;
//! - Link = ссылка кандидата; stored Link остаётся только если у кандидата её нет.
//!
//! Dropping stored-only keys loses their history. It mirrors the feed being
//! the authority on which entities are currently listed; a union/tombstone
//! model would need an explicit decision first.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::Result;
use crate::model::{CandidateSet, EntityRecord, RunTimestamp, Snapshot};

/// Merge `candidate` with `stored`. With no stored snapshot the result is the
/// candidate stamped with `run_ts`.
pub fn merge(
    stored: Option<&Snapshot>,
    candidate: &CandidateSet,
    run_ts: RunTimestamp,
) -> Result<Snapshot> {
    let run_at = run_ts.as_datetime();

    let Some(stored) = stored else {
        let records = candidate
            .records()
            .iter()
            .map(|c| EntityRecord {
                key: c.key.clone(),
                link: c.link.clone(),
                since: run_at,
            })
            .collect();
        return Snapshot::new(records);
    };

    let index: HashMap<&str, &EntityRecord> = stored
        .records()
        .iter()
        .map(|r| (r.key.as_str(), r))
        .collect();

    let mut merged = Vec::with_capacity(candidate.len());
    let mut carried_links = 0usize;
    for c in candidate.records() {
        let rec = match index.get(c.key.as_str()) {
            None => EntityRecord {
                key: c.key.clone(),
                link: c.link.clone(),
                since: run_at,
            },
            Some(old) => {
                let link = match (&c.link, &old.link) {
                    (Some(new), _) => Some(new.clone()),
                    (None, Some(kept)) => {
                        carried_links += 1;
                        Some(kept.clone())
                    }
                    (None, None) => None,
                };
                EntityRecord {
                    key: c.key.clone(),
                    link,
                    since: old.since.min(run_at),
                }
            }
        };
        merged.push(rec);
    }

    let live: HashSet<&str> = candidate.records().iter().map(|c| c.key.as_str()).collect();
    let dropped = stored
        .records()
        .iter()
        .filter(|r| !live.contains(r.key.as_str()))
        .count();
    debug!(
        "merge: candidate={} stored={} dropped_stale={} carried_links={}",
        candidate.len(),
        stored.len(),
        dropped,
        carried_links
    );

    Snapshot::new(merged)
}
