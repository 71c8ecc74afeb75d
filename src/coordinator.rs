//! Run coordinator: one pass over the configured entity types.
//!
//! Per entity type, strictly in configured order:
//!   extract -> (empty? skip) -> stamp with run_ts -> load stored ->
//!   unchanged? skip -> merge -> save snapshot -> log latest date.
//!
//! Ошибка одной сущности логируется и попадает в отчёт; цикл идёт дальше.
//! Единственное общее состояние между сущностями - `RunTimestamp` запуска.
//! Весь проход выполняется под эксклюзивным lock'ом каталога данных.

use log::{error, info, warn};
use serde::Serialize;

use crate::config::{url_env_var, SyncConfig};
use crate::detect::Comparison;
use crate::error::{ErrorKind, Result};
use crate::extract::Extractor;
use crate::lock::try_lock_data_dir;
use crate::meta_log::MetaLog;
use crate::model::{CandidateSet, FeedRow, RunTimestamp};
use crate::reconcile::merge;
use crate::store::SnapshotStore;

/// What happened to one entity type during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityOutcome {
    /// No source configured; skipped with a warning.
    MissingUrl,
    /// Extractor returned no rows; stored snapshot untouched.
    NoData,
    /// Candidate equals stored snapshot; nothing written.
    Unchanged { records: usize },
    /// Snapshot (re)written and metadata logged.
    Updated { records: usize, created: bool },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity: String,
    #[serde(flatten)]
    pub outcome: EntityOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_timestamp: RunTimestamp,
    pub entities: Vec<EntityReport>,
}

impl RunReport {
    pub fn outcome(&self, entity: &str) -> Option<&EntityOutcome> {
        self.entities
            .iter()
            .find(|r| r.entity == entity)
            .map(|r| &r.outcome)
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Updated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.entities.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Entity type plus where to read it from (`None` = not configured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySource {
    pub entity: String,
    pub source: Option<String>,
}

impl EntitySource {
    pub fn new(entity: impl Into<String>, source: Option<String>) -> Self {
        Self {
            entity: entity.into(),
            source,
        }
    }
}

/// Entity types in configured order, paired with their URLs.
pub fn plan_from_config(cfg: &SyncConfig) -> Vec<EntitySource> {
    cfg.entity_types
        .iter()
        .map(|e| EntitySource::new(e.clone(), cfg.url_for(e).map(str::to_string)))
        .collect()
}

pub struct Coordinator<E: Extractor> {
    store: SnapshotStore,
    meta: MetaLog,
    extractor: E,
    comparison: Comparison,
}

impl<E: Extractor> Coordinator<E> {
    pub fn new(store: SnapshotStore, meta: MetaLog, extractor: E, comparison: Comparison) -> Self {
        Self {
            store,
            meta,
            extractor,
            comparison,
        }
    }

    pub fn from_config(cfg: &SyncConfig, extractor: E) -> Self {
        Self::new(
            SnapshotStore::new(&cfg.data_dir).with_prefix(cfg.snapshot_prefix.clone()),
            MetaLog::new(&cfg.meta_dir),
            extractor,
            cfg.comparison,
        )
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn meta_log(&self) -> &MetaLog {
        &self.meta
    }

    /// Process every entry of `plan` under the data directory lock.
    ///
    /// Only lock acquisition fails the whole run; per-entity errors land in
    /// the report.
    pub fn run(&self, plan: &[EntitySource], run_ts: RunTimestamp) -> Result<RunReport> {
        let _lock = try_lock_data_dir(self.store.data_dir())?;
        info!(
            "Starting data processing for {} entity types (run at {})",
            plan.len(),
            run_ts
        );

        let mut entities = Vec::with_capacity(plan.len());
        for item in plan {
            let outcome = match item.source.as_deref() {
                None => {
                    warn!(
                        "No source URL for {} ({} not set), skipping",
                        item.entity,
                        url_env_var(&item.entity)
                    );
                    EntityOutcome::MissingUrl
                }
                Some(source) => {
                    info!("Processing {}...", item.entity);
                    match self.sync_entity(&item.entity, source, run_ts) {
                        Ok(o) => o,
                        Err(e) => {
                            error!("Error processing {}: {}", item.entity, e);
                            EntityOutcome::Failed {
                                kind: e.kind(),
                                message: e.to_string(),
                            }
                        }
                    }
                }
            };
            entities.push(EntityReport {
                entity: item.entity.clone(),
                outcome,
            });
        }

        let report = RunReport {
            run_timestamp: run_ts,
            entities,
        };
        info!(
            "Data processing completed: {} updated, {} failed",
            report.updated(),
            report.failed()
        );
        Ok(report)
    }

    /// Extract `entity` from `source`, then reconcile.
    pub fn sync_entity(
        &self,
        entity: &str,
        source: &str,
        run_ts: RunTimestamp,
    ) -> Result<EntityOutcome> {
        let rows = self.extractor.extract(entity, source)?;
        self.apply(entity, rows, run_ts)
    }

    /// Reconcile already-extracted rows against the stored snapshot.
    pub fn apply(
        &self,
        entity: &str,
        rows: Vec<FeedRow>,
        run_ts: RunTimestamp,
    ) -> Result<EntityOutcome> {
        if rows.is_empty() {
            info!("No data found for {}", entity);
            return Ok(EntityOutcome::NoData);
        }
        let candidate = CandidateSet::stamp(rows, run_ts)?;
        let stored = self.store.load(entity)?;

        if !self.comparison.has_changed(stored.as_ref(), &candidate) {
            info!("No changes detected for {}, skipping update", entity);
            return Ok(EntityOutcome::Unchanged {
                records: candidate.len(),
            });
        }
        let created = stored.is_none();
        if created {
            info!("No stored snapshot for {}, creating one", entity);
        } else {
            info!("Changes detected for {}, updating data", entity);
        }

        // merge целиком до записи: частичный snapshot на диск не попадает
        let merged = merge(stored.as_ref(), &candidate, run_ts)?;
        // пропавший в фиде link сохраняется из snapshot'а: итог может совпасть с диском
        if stored.as_ref() == Some(&merged) {
            info!("Merged data for {} equals stored snapshot, skipping update", entity);
            return Ok(EntityOutcome::Unchanged {
                records: merged.len(),
            });
        }
        let path = self.store.save(entity, &merged)?;
        self.meta.record_update(entity, run_ts)?;

        info!(
            "Successfully processed {} records for {} ({})",
            merged.len(),
            entity,
            path.display()
        );
        Ok(EntityOutcome::Updated {
            records: merged.len(),
            created,
        })
    }
}
