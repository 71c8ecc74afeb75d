use anyhow::{anyhow, Result};
use std::path::PathBuf;

use feedsnap::{Coordinator, EntitySource, FileXlsxExtractor, RunTimestamp};

use crate::cli::DirArgs;
use crate::util::{load_config, print_json, print_report};

/// Сверка одной сущности из локального xlsx (без сети).
pub fn exec(
    dirs: DirArgs,
    entity: String,
    xlsx: PathBuf,
    compare: Option<String>,
    json: bool,
) -> Result<()> {
    let cfg = load_config(&dirs, compare.as_deref())?.with_entity_types([entity.clone()]);
    cfg.validate()?;
    if !xlsx.is_file() {
        return Err(anyhow!("workbook not found: {}", xlsx.display()));
    }

    let coordinator = Coordinator::from_config(&cfg, FileXlsxExtractor::new(cfg.sheet_spec()));
    let plan = [EntitySource::new(
        entity,
        Some(xlsx.to_string_lossy().into_owned()),
    )];
    let report = coordinator.run(&plan, RunTimestamp::now())?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    if report.has_failures() {
        return Err(anyhow!("ingest failed"));
    }
    Ok(())
}
