use anyhow::{anyhow, Result};

use feedsnap::{plan_from_config, Coordinator, HttpXlsxExtractor, RunTimestamp};

use crate::cli::DirArgs;
use crate::util::{load_config, print_json, print_report};

/// Один проход по всем сущностям. Код выхода 1, если хоть одна упала.
pub fn exec(dirs: DirArgs, entities: Vec<String>, compare: Option<String>, json: bool) -> Result<()> {
    let mut cfg = load_config(&dirs, compare.as_deref())?;
    if !entities.is_empty() {
        let unknown: Vec<&String> = entities
            .iter()
            .filter(|e| !cfg.entity_types.contains(e))
            .collect();
        if !unknown.is_empty() {
            return Err(anyhow!(
                "unknown entity type(s) {:?}; configured: {:?}",
                unknown,
                cfg.entity_types
            ));
        }
        cfg = cfg.with_entity_types(entities);
    }
    log::debug!("{cfg}");

    let extractor = HttpXlsxExtractor::new(&cfg.data_dir, cfg.sheet_spec(), cfg.fetch_timeout());
    let coordinator = Coordinator::from_config(&cfg, extractor);

    // один "now" на весь запуск
    let run_ts = RunTimestamp::now();
    let report = coordinator.run(&plan_from_config(&cfg), run_ts)?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    if report.has_failures() {
        return Err(anyhow!("{} entity type(s) failed", report.failed()));
    }
    Ok(())
}
