//! Общие константы форматов (snapshot CSV, metadata JSON, имена файлов).

// -------- Timestamps --------
/// Фиксированный формат `Since` / `latest_date` на диске (всегда UTC).
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// -------- Directories --------
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_META_DIR: &str = "metadata";

// -------- Entity types --------
pub const DEFAULT_ENTITY_TYPES: &[&str] = &["Journal", "Publisher"];

// -------- Snapshot file --------
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "predatory_";
pub const SNAPSHOT_EXT: &str = "csv";
pub const LINK_COLUMN: &str = "Link";
pub const SINCE_COLUMN: &str = "Since";

// -------- Metadata log --------
// <meta_dir>/<entity lowercase>s_latest_date.json
pub const META_FILE_SUFFIX: &str = "s_latest_date.json";

// -------- Extractor --------
pub const TEMP_DOWNLOAD_SUFFIX: &str = "_temp.xlsx";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_KEY_COLUMN: &str = "B";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
/// Верхняя граница размера скачиваемой книги.
pub const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

// -------- Run lock --------
pub const LOCK_FILE: &str = "LOCK";
