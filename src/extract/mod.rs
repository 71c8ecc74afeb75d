//! extract - откуда берутся строки кандидата.
//!
//! `Extractor` - шов между сетью/форматом и ядром сверки: по типу сущности и
//! источнику возвращает строки (Key, Link) в порядке фида. Порядок должен быть
//! стабилен между запусками, иначе change detector увидит «изменение».
//!
//! Реализации:
//! - `HttpXlsxExtractor` - скачивает книгу во временный файл и читает колонку;
//! - `FileXlsxExtractor` - та же разборка локального файла (команда `ingest`).

pub mod download;
pub mod xlsx;

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use crate::consts::TEMP_DOWNLOAD_SUFFIX;
use crate::error::Result;
use crate::model::FeedRow;

pub use download::TempDownload;
pub use xlsx::{read_key_column, read_key_column_file, SheetSpec};

pub trait Extractor {
    /// Rows for `entity` read from `source` (URL or path), in feed order.
    fn extract(&self, entity: &str, source: &str) -> Result<Vec<FeedRow>>;
}

/// Download over HTTP(S) into `<temp_dir>/<entity>_temp.xlsx`, parse, remove.
#[derive(Debug, Clone)]
pub struct HttpXlsxExtractor {
    temp_dir: PathBuf,
    sheet: SheetSpec,
    timeout: Duration,
}

impl HttpXlsxExtractor {
    pub fn new(temp_dir: impl Into<PathBuf>, sheet: SheetSpec, timeout: Duration) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            sheet,
            timeout,
        }
    }

    pub fn temp_path(&self, entity: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}{}", entity.to_lowercase(), TEMP_DOWNLOAD_SUFFIX))
    }
}

impl Extractor for HttpXlsxExtractor {
    fn extract(&self, entity: &str, source: &str) -> Result<Vec<FeedRow>> {
        let download = TempDownload::fetch(source, &self.temp_path(entity), self.timeout)?;
        debug!(
            "extract: {} downloaded {} bytes to {}",
            entity,
            download.bytes(),
            download.path().display()
        );
        // guard живёт до конца разбора; файл удаляется при выходе из функции
        read_key_column_file(download.path(), &self.sheet)
    }
}

/// Parse a workbook already on disk; `source` is its path.
#[derive(Debug, Clone)]
pub struct FileXlsxExtractor {
    sheet: SheetSpec,
}

impl FileXlsxExtractor {
    pub fn new(sheet: SheetSpec) -> Self {
        Self { sheet }
    }
}

impl Extractor for FileXlsxExtractor {
    fn extract(&self, entity: &str, source: &str) -> Result<Vec<FeedRow>> {
        debug!("extract: {} from local workbook {}", entity, source);
        read_key_column_file(Path::new(source), &self.sheet)
    }
}

impl<E: Extractor + ?Sized> Extractor for &E {
    fn extract(&self, entity: &str, source: &str) -> Result<Vec<FeedRow>> {
        (**self).extract(entity, source)
    }
}
