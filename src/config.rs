//! Centralized configuration for feedsnap runs.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - `SyncConfig::from_env()` reads the environment; CLI flags override on top
//!   via the `with_*` setters.
//!
//! Environment:
//! - FEEDSNAP_DATA_DIR           snapshot directory (default "data")
//! - FEEDSNAP_META_DIR           metadata log directory (default "metadata")
//! - FEEDSNAP_ENTITIES           ordered, comma separated (default "Journal,Publisher")
//! - <ENTITY>_URL                source URL per entity type, e.g. JOURNAL_URL
//! - FEEDSNAP_SHEET              worksheet name (default "Sheet1")
//! - FEEDSNAP_KEY_COLUMN         column with names + hyperlinks (default "B")
//! - FEEDSNAP_FETCH_TIMEOUT_SECS download timeout (default 60)
//! - FEEDSNAP_COMPARE            "ordered" (default) | "set"
//! - FEEDSNAP_SNAPSHOT_PREFIX    snapshot file prefix (default "predatory_")

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::consts::{
    DEFAULT_DATA_DIR, DEFAULT_ENTITY_TYPES, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_KEY_COLUMN,
    DEFAULT_META_DIR, DEFAULT_SHEET_NAME, DEFAULT_SNAPSHOT_PREFIX,
};
use crate::detect::Comparison;
use crate::error::{Result, SyncError};
use crate::extract::xlsx::column_index;
use crate::extract::SheetSpec;

/// Name of the environment variable carrying the source URL for `entity`.
pub fn url_env_var(entity: &str) -> String {
    format!("{}_URL", entity.to_uppercase())
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    pub meta_dir: PathBuf,

    /// Processing order of entity types.
    pub entity_types: Vec<String>,

    /// entity type -> source URL. Entities without a URL are skipped with a warning.
    pub urls: BTreeMap<String, String>,

    pub sheet: String,
    pub key_column: String,
    pub fetch_timeout_secs: u64,
    pub comparison: Comparison,
    pub snapshot_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            meta_dir: PathBuf::from(DEFAULT_META_DIR),
            entity_types: DEFAULT_ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
            urls: BTreeMap::new(),
            sheet: DEFAULT_SHEET_NAME.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            comparison: Comparison::default(),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env`, reading values through `get` (tests pass a map).
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("FEEDSNAP_DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("FEEDSNAP_META_DIR") {
            cfg.meta_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("FEEDSNAP_ENTITIES") {
            cfg.entity_types = parse_entity_list(&v);
        }
        if let Some(v) = non_empty("FEEDSNAP_SHEET") {
            cfg.sheet = v;
        }
        if let Some(v) = non_empty("FEEDSNAP_KEY_COLUMN") {
            cfg.key_column = v;
        }
        if let Some(v) = non_empty("FEEDSNAP_FETCH_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(n) => cfg.fetch_timeout_secs = n,
                Err(_) => warn!("config: ignoring FEEDSNAP_FETCH_TIMEOUT_SECS='{v}' (not a number)"),
            }
        }
        if let Some(v) = non_empty("FEEDSNAP_COMPARE") {
            cfg.comparison = v.parse()?;
        }
        if let Some(v) = get("FEEDSNAP_SNAPSHOT_PREFIX") {
            cfg.snapshot_prefix = v.trim().to_string();
        }

        for entity in &cfg.entity_types {
            if let Some(url) = non_empty(&url_env_var(entity)) {
                cfg.urls.insert(entity.clone(), url);
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_meta_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.meta_dir = dir.into();
        self
    }

    pub fn with_entity_types<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_url(mut self, entity: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.insert(entity.into(), url.into());
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>, key_column: impl Into<String>) -> Self {
        self.sheet = sheet.into();
        self.key_column = key_column.into();
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_snapshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_prefix = prefix.into();
        self
    }

    pub fn url_for(&self, entity: &str) -> Option<&str> {
        self.urls.get(entity).map(String::as_str)
    }

    pub fn sheet_spec(&self) -> SheetSpec {
        SheetSpec::new(self.sheet.clone(), self.key_column.clone())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Entity names become file names and CSV headers; reject the unusable ones.
    pub fn validate(&self) -> Result<()> {
        if self.entity_types.is_empty() {
            return Err(SyncError::Config("no entity types configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for e in &self.entity_types {
            if e.is_empty() || !e.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(SyncError::Config(format!(
                    "entity type '{e}' must be non-empty ASCII letters, digits or '_'"
                )));
            }
            if !seen.insert(e.to_lowercase()) {
                return Err(SyncError::Config(format!("entity type '{e}' listed twice")));
            }
        }
        if column_index(&self.key_column).is_none() {
            return Err(SyncError::Config(format!(
                "key column '{}' is not a column letter",
                self.key_column
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SyncError::Config("fetch timeout must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_entity_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let urls: Vec<&str> = self
            .entity_types
            .iter()
            .map(|e| if self.urls.contains_key(e) { "set" } else { "missing" })
            .collect();
        write!(
            f,
            "SyncConfig {{ \
             data_dir: {}, \
             meta_dir: {}, \
             entities: [{}], \
             urls: [{}], \
             sheet: {}!{}, \
             fetch_timeout_secs: {}, \
             compare: {}, \
             snapshot_prefix: {:?} \
             }}",
            self.data_dir.display(),
            self.meta_dir.display(),
            self.entity_types.join(", "),
            urls.join(", "),
            self.sheet,
            self.key_column,
            self.fetch_timeout_secs,
            self.comparison,
            self.snapshot_prefix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.meta_dir, PathBuf::from("metadata"));
        assert_eq!(cfg.entity_types, vec!["Journal", "Publisher"]);
        assert!(cfg.urls.is_empty());
        assert_eq!(cfg.comparison, Comparison::OrderSensitive);
        assert_eq!(cfg.sheet_spec(), SheetSpec::new("Sheet1", "B"));
    }

    #[test]
    fn urls_keyed_by_uppercase_entity() {
        let cfg = SyncConfig::from_lookup(lookup(&[
            ("JOURNAL_URL", " https://example.org/j.xlsx "),
            ("PUBLISHER_URL", "   "),
            ("FEEDSNAP_COMPARE", "set"),
            ("FEEDSNAP_FETCH_TIMEOUT_SECS", "abc"),
        ]))
        .unwrap();
        assert_eq!(cfg.url_for("Journal"), Some("https://example.org/j.xlsx"));
        assert_eq!(cfg.url_for("Publisher"), None, "blank URL counts as missing");
        assert_eq!(cfg.comparison, Comparison::SetEquality);
        assert_eq!(cfg.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
    }

    #[test]
    fn custom_entity_list_and_validation() {
        let cfg = SyncConfig::from_lookup(lookup(&[
            ("FEEDSNAP_ENTITIES", "Journal, Conference ,"),
            ("CONFERENCE_URL", "https://example.org/c.xlsx"),
        ]))
        .unwrap();
        assert_eq!(cfg.entity_types, vec!["Journal", "Conference"]);
        assert!(cfg.url_for("Conference").is_some());

        assert!(SyncConfig::from_lookup(lookup(&[("FEEDSNAP_ENTITIES", "Bad/Name")])).is_err());
        assert!(SyncConfig::from_lookup(lookup(&[("FEEDSNAP_ENTITIES", "A,a")])).is_err());
        assert!(SyncConfig::from_lookup(lookup(&[("FEEDSNAP_KEY_COLUMN", "2")])).is_err());
        assert!(SyncConfig::from_lookup(lookup(&[("FEEDSNAP_COMPARE", "fuzzy")])).is_err());
    }

    #[test]
    fn display_hides_url_values() {
        let cfg = SyncConfig::default().with_url("Journal", "https://secret.example/j.xlsx");
        let s = cfg.to_string();
        assert!(s.contains("urls: [set, missing]"), "{s}");
        assert!(!s.contains("secret"));
    }
}
