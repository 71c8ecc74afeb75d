// Базовые модули
pub mod consts;
pub mod error;
pub mod model;
pub mod config;

// Ядро сверки
pub mod store;      // snapshot CSV load/save
pub mod detect;     // change detector (ordered / set)
pub mod reconcile;  // merge candidate -> stored

// Окружение прогона
pub mod extract;    // src/extract/{mod,download,xlsx}.rs
pub mod meta_log;
pub mod lock;
pub mod coordinator;

// Утилиты (write_atomic, fsync_dir)
pub mod util;       // src/util/mod.rs

// Удобные реэкспорты
pub use config::SyncConfig;
pub use coordinator::{plan_from_config, Coordinator, EntityOutcome, EntitySource, RunReport};
pub use detect::Comparison;
pub use error::{ErrorKind, Result, SyncError};
pub use extract::{Extractor, FileXlsxExtractor, HttpXlsxExtractor, SheetSpec};
pub use meta_log::{LatestDate, MetaLog};
pub use model::{CandidateSet, EntityRecord, FeedRow, RunTimestamp, Snapshot};
pub use reconcile::merge;
pub use store::SnapshotStore;
