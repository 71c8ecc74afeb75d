use anyhow::{Context, Result};

use feedsnap::{Comparison, EntityOutcome, RunReport, SyncConfig};

use crate::cli::DirArgs;

/// Env configuration with CLI overrides applied on top.
pub fn load_config(dirs: &DirArgs, compare: Option<&str>) -> Result<SyncConfig> {
    let mut cfg = SyncConfig::from_env().context("read configuration from environment")?;
    if let Some(d) = &dirs.data_dir {
        cfg = cfg.with_data_dir(d);
    }
    if let Some(d) = &dirs.meta_dir {
        cfg = cfg.with_meta_dir(d);
    }
    if let Some(c) = compare {
        let c: Comparison = c.parse().context("--compare")?;
        cfg = cfg.with_comparison(c);
    }
    Ok(cfg)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize JSON output")?;
    println!("{s}");
    Ok(())
}

pub fn print_report(report: &RunReport) {
    println!("run at {}", report.run_timestamp);
    for r in &report.entities {
        let line = match &r.outcome {
            EntityOutcome::MissingUrl => "skipped (no source URL)".to_string(),
            EntityOutcome::NoData => "skipped (no data found)".to_string(),
            EntityOutcome::Unchanged { records } => format!("unchanged ({records} records)"),
            EntityOutcome::Updated { records, created } => {
                let verb = if *created { "created" } else { "updated" };
                format!("{verb} ({records} records)")
            }
            EntityOutcome::Failed { kind, message } => format!("FAILED [{kind:?}] {message}"),
        };
        println!("  {:12} {}", r.entity, line);
    }
}
