use anyhow::{Context, Result};
use serde::Serialize;

use feedsnap::model::format_since;
use feedsnap::{MetaLog, SnapshotStore};

use crate::cli::DirArgs;
use crate::util::{load_config, print_json};

#[derive(Debug, Serialize)]
struct EntityStatus {
    entity: String,
    snapshot: String,
    present: bool,
    records: usize,
    with_link: usize,
    earliest_since: Option<String>,
    latest_since: Option<String>,
    latest_date: Option<String>,
    url_configured: bool,
}

/// Состояние snapshot'ов и metadata по каждой сконфигурированной сущности.
pub fn exec(dirs: DirArgs, json: bool) -> Result<()> {
    let cfg = load_config(&dirs, None)?;
    let store = SnapshotStore::new(&cfg.data_dir).with_prefix(cfg.snapshot_prefix.clone());
    let meta = MetaLog::new(&cfg.meta_dir);

    let mut out = Vec::with_capacity(cfg.entity_types.len());
    for entity in &cfg.entity_types {
        let snap = store
            .load(entity)
            .with_context(|| format!("load snapshot for {entity}"))?;
        let latest = meta
            .read(entity)
            .with_context(|| format!("read metadata for {entity}"))?;
        out.push(EntityStatus {
            entity: entity.clone(),
            snapshot: store.snapshot_path(entity).display().to_string(),
            present: snap.is_some(),
            records: snap.as_ref().map(|s| s.len()).unwrap_or(0),
            with_link: snap
                .as_ref()
                .map(|s| s.records().iter().filter(|r| r.link.is_some()).count())
                .unwrap_or(0),
            earliest_since: snap.as_ref().and_then(|s| s.earliest_since()).map(|t| format_since(&t)),
            latest_since: snap.as_ref().and_then(|s| s.latest_since()).map(|t| format_since(&t)),
            latest_date: latest.map(|l| l.latest_date),
            url_configured: cfg.url_for(entity).is_some(),
        });
    }

    if json {
        return print_json(&out);
    }

    for s in &out {
        println!("{}:", s.entity);
        println!("  snapshot       = {}{}", s.snapshot, if s.present { "" } else { " (missing)" });
        if s.present {
            println!("  records        = {} ({} with link)", s.records, s.with_link);
            println!("  earliest_since = {}", s.earliest_since.as_deref().unwrap_or("-"));
            println!("  latest_since   = {}", s.latest_since.as_deref().unwrap_or("-"));
        }
        println!("  latest_date    = {}", s.latest_date.as_deref().unwrap_or("(never)"));
        println!("  url            = {}", if s.url_configured { "set" } else { "missing" });
    }
    Ok(())
}
