//! xlsx - чтение одной колонки листа вместе с гиперссылками ячеек.
//!
//! xlsx = zip-контейнер SpreadsheetML:
//! - xl/workbook.xml               - <sheet name=".." r:id="rIdN"/>
//! - xl/_rels/workbook.xml.rels    - rIdN -> worksheets/sheetK.xml
//! - xl/sharedStrings.xml          - таблица строк (<si><t>..</t></si>, rich text <r><t>)
//! - xl/worksheets/sheetK.xml      - <row><c r="B2" t="s"><v>0</v></c></row> + <hyperlinks>
//! - xl/worksheets/_rels/sheetK.xml.rels - rId гиперссылок -> внешний Target
//!
//! Строки выдаются в порядке номеров строк листа. Пустые ячейки ключа пропускаются.
//! Hyperlink с диапазоном (ref="B2:B4") применяется ко всем ячейкам диапазона.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Result, SyncError};
use crate::model::FeedRow;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
/// Предел строк листа в Excel.
const MAX_ROWS: u32 = 1_048_576;

/// Which sheet and column hold the tracked names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSpec {
    pub sheet: String,
    /// Column letters, e.g. "B".
    pub column: String,
}

impl SheetSpec {
    pub fn new(sheet: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            column: column.into(),
        }
    }

    fn column_index(&self) -> Result<u32> {
        column_index(&self.column).ok_or_else(|| {
            SyncError::Config(format!("invalid column letters '{}'", self.column))
        })
    }
}

pub fn read_key_column_file(path: &Path, layout: &SheetSpec) -> Result<Vec<FeedRow>> {
    let f = std::fs::File::open(path).map_err(|e| SyncError::persistence(path, e))?;
    read_key_column(f, layout)
}

/// Extract (name, hyperlink) rows from `layout.column` of `layout.sheet`.
pub fn read_key_column<R: Read + Seek>(reader: R, layout: &SheetSpec) -> Result<Vec<FeedRow>> {
    let col = layout.column_index()?;
    let mut zip = ZipArchive::new(reader)?;

    let workbook = read_entry(&mut zip, WORKBOOK)?
        .ok_or_else(|| SyncError::Parse(format!("{WORKBOOK} missing: not an xlsx workbook")))?;
    let rel_id = find_sheet_rel_id(&workbook, &layout.sheet)?
        .ok_or_else(|| SyncError::Parse(format!("worksheet '{}' not found", layout.sheet)))?;

    let wb_rels = read_entry(&mut zip, WORKBOOK_RELS)?
        .ok_or_else(|| SyncError::Parse(format!("{WORKBOOK_RELS} missing")))?;
    let target = parse_relationships(&wb_rels)?
        .remove(&rel_id)
        .ok_or_else(|| SyncError::Parse(format!("relationship {rel_id} not found")))?;
    let sheet_path = resolve_part("xl", &target);

    let shared = match read_entry(&mut zip, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_entry(&mut zip, &sheet_path)?
        .ok_or_else(|| SyncError::Parse(format!("sheet part {sheet_path} missing")))?;
    let sheet_rels = match read_entry(&mut zip, &sheet_rels_path(&sheet_path))? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let parsed = parse_sheet(&sheet_xml, col, &shared)?;

    // диапазоны не разворачиваются по строкам: ref="B1:B1048576" - одна запись
    let links: Vec<(u32, u32, &String)> = parsed
        .hyperlinks
        .iter()
        .filter_map(|hl| {
            // внутренняя ссылка (location) - не URL
            let target = hl.rel_id.as_ref().and_then(|id| sheet_rels.get(id))?;
            Some((hl.first_row, hl.last_row, target))
        })
        .collect();
    let link_for = |row: u32| {
        links
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&row))
            .map(|(_, _, target)| (*target).clone())
    };

    let mut rows = Vec::with_capacity(parsed.cells.len());
    let mut blank = 0usize;
    for (row, value) in parsed.cells {
        if value.trim().is_empty() {
            blank += 1;
            continue;
        }
        rows.push(FeedRow::new(value, link_for(row)));
    }
    debug!(
        "xlsx: sheet '{}' column {}: {} rows, {} blank skipped, {} hyperlink ranges",
        layout.sheet,
        layout.column,
        rows.len(),
        blank,
        links.len()
    );
    Ok(rows)
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut f = match zip.by_name(name) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut s = String::new();
    f.read_to_string(&mut s)
        .map_err(|e| SyncError::Parse(format!("read {name}: {e}")))?;
    Ok(Some(s))
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn sheet_rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target relative to `base` ("xl"), or absolute ("/xl/..").
fn resolve_part(base: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn attr(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        if a.key.as_ref() == name {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Namespaced relationship id attribute (`r:id`, whatever the prefix).
fn rel_id_attr(e: &BytesStart) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        if a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some() {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn find_sheet_rel_id(xml: &str, sheet: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if attr(&e, b"name")?.as_deref() == Some(sheet) {
                    return rel_id_attr(&e);
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Id -> Target
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut cur: Option<String> = None;
    let mut in_t = false;
    let mut phonetic = 0u32; // <rPh> - фонетика, не часть значения
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => cur = Some(String::new()),
                b"t" => in_t = phonetic == 0,
                b"rPh" => phonetic += 1,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(t) if in_t => {
                if let Some(s) = cur.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_t => {
                if let Some(s) = cur.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.push(cur.take().unwrap_or_default()),
                b"t" => in_t = false,
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Debug)]
struct Hyperlink {
    rel_id: Option<String>,
    first_row: u32,
    last_row: u32,
}

#[derive(Debug, Default)]
struct ParsedSheet {
    /// row number -> displayed cell value of the key column
    cells: BTreeMap<u32, String>,
    hyperlinks: Vec<Hyperlink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Shared,
    Inline,
    Bool,
    Error,
    Plain,
}

impl CellType {
    fn from_attr(t: Option<&str>) -> Self {
        match t {
            Some("s") => CellType::Shared,
            Some("inlineStr") => CellType::Inline,
            Some("b") => CellType::Bool,
            Some("e") => CellType::Error,
            _ => CellType::Plain,
        }
    }
}

struct CellState {
    row: u32,
    ty: CellType,
    value: String,
    inline: String,
}

fn parse_sheet(xml: &str, key_col: u32, shared: &[String]) -> Result<ParsedSheet> {
    let mut reader = Reader::from_str(xml);
    let mut out = ParsedSheet::default();

    let mut row_no = 0u32;
    let mut next_col = 1u32;
    let mut cell: Option<CellState> = None;
    let mut in_v = false;
    let mut in_inline_t = false;
    let mut phonetic = 0u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_no = next_row(&e, row_no)?;
                    next_col = 1;
                }
                b"c" => {
                    let (row, col) = cell_position(&e, row_no, next_col)?;
                    next_col = col.saturating_add(1);
                    if col == key_col {
                        cell = Some(CellState {
                            row,
                            ty: CellType::from_attr(attr(&e, b"t")?.as_deref()),
                            value: String::new(),
                            inline: String::new(),
                        });
                    }
                }
                b"v" => in_v = cell.is_some(),
                b"t" => in_inline_t = cell.is_some() && phonetic == 0,
                b"rPh" => phonetic += 1,
                b"hyperlink" => {
                    if let Some(h) = hyperlink(&e, key_col)? {
                        out.hyperlinks.push(h);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_no = next_row(&e, row_no)?;
                    next_col = 1;
                }
                b"c" => {
                    let (_, col) = cell_position(&e, row_no, next_col)?;
                    next_col = col.saturating_add(1);
                }
                b"hyperlink" => {
                    if let Some(h) = hyperlink(&e, key_col)? {
                        out.hyperlinks.push(h);
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(c) = cell.as_mut() {
                    if in_v {
                        c.value.push_str(&t.unescape()?);
                    } else if in_inline_t {
                        c.inline.push_str(&t.unescape()?);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"t" => in_inline_t = false,
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                b"c" => {
                    if let Some(c) = cell.take() {
                        let shown = cell_value(&c, shared)?;
                        out.cells.insert(c.row, shown);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn row_attr(e: &BytesStart) -> Result<Option<u32>> {
    match attr(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_ROWS).contains(n))
            .map(Some)
            .ok_or_else(|| SyncError::Parse(format!("bad row number '{r}'"))),
        None => Ok(None),
    }
}

/// Row number of a `<row>`; without `r` it follows the previous one.
fn next_row(e: &BytesStart, prev: u32) -> Result<u32> {
    if let Some(n) = row_attr(e)? {
        return Ok(n);
    }
    prev.checked_add(1)
        .filter(|n| *n <= MAX_ROWS)
        .ok_or_else(|| SyncError::Parse(format!("row after {prev} exceeds {MAX_ROWS} rows")))
}

/// (row, col) of a `<c>`; cells without `r` continue from the previous one.
fn cell_position(e: &BytesStart, row_no: u32, next_col: u32) -> Result<(u32, u32)> {
    match attr(e, b"r")? {
        Some(r) => split_ref(&r)
            .map(|(col, row)| (row, col))
            .ok_or_else(|| SyncError::Parse(format!("bad cell reference '{r}'"))),
        None => Ok((row_no, next_col)),
    }
}

fn hyperlink(e: &BytesStart, key_col: u32) -> Result<Option<Hyperlink>> {
    let Some(r) = attr(e, b"ref")? else {
        return Ok(None);
    };
    let (from, to) = match r.split_once(':') {
        Some((a, b)) => (a, b),
        None => (r.as_str(), r.as_str()),
    };
    let (Some((c1, r1)), Some((c2, r2))) = (split_ref(from), split_ref(to)) else {
        return Err(SyncError::Parse(format!("bad hyperlink ref '{r}'")));
    };
    if key_col < c1.min(c2) || key_col > c1.max(c2) {
        return Ok(None);
    }
    Ok(Some(Hyperlink {
        rel_id: rel_id_attr(e)?,
        first_row: r1.min(r2),
        last_row: r1.max(r2),
    }))
}

fn cell_value(c: &CellState, shared: &[String]) -> Result<String> {
    Ok(match c.ty {
        CellType::Shared => {
            let idx: usize = c.value.trim().parse().map_err(|_| {
                SyncError::Parse(format!("row {}: bad shared string index '{}'", c.row, c.value))
            })?;
            shared.get(idx).cloned().ok_or_else(|| {
                SyncError::Parse(format!("row {}: shared string {idx} out of range", c.row))
            })?
        }
        CellType::Inline => c.inline.clone(),
        CellType::Bool => match c.value.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        CellType::Error => String::new(),
        CellType::Plain => c.value.clone(),
    })
}

/// "AB12" -> (28, 12)
fn split_ref(r: &str) -> Option<(u32, u32)> {
    let r = r.trim().replace('$', "");
    let split = r.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    let col = column_index(letters)?;
    let row = digits
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=MAX_ROWS).contains(n))?;
    Some((col, row))
}

/// "A" -> 1, "Z" -> 26, "AA" -> 27
pub fn column_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut n = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(n)
}
