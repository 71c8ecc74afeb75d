use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use feedsnap::extract::read_key_column;
use feedsnap::{
    Comparison, Coordinator, EntityOutcome, EntitySource, ErrorKind, Extractor,
    FileXlsxExtractor, MetaLog, RunTimestamp, SheetSpec, SnapshotStore, SyncError,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("feedsnap-xlsx-{prefix}-{pid}-{t}-{id}"))
}

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_SHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_LINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

fn esc(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('"', "&quot;")
}

/// Minimal workbook: "Cover" sheet first, then `sheet_name` holding
/// column A = row number, column B = name (shared string) + optional hyperlink.
fn build_xlsx(sheet_name: &str, rows: &[(&str, Option<&str>)]) -> Vec<u8> {
    build_xlsx_with_ranges(sheet_name, rows, &[])
}

/// Same as `build_xlsx`, plus extra `(ref, url)` hyperlinks such as "B1:B20".
fn build_xlsx_with_ranges(
    sheet_name: &str,
    rows: &[(&str, Option<&str>)],
    ranges: &[(&str, &str)],
) -> Vec<u8> {
    let mut shared = String::new();
    let mut sheet_rows = String::new();
    let mut links = String::new();
    let mut rels = String::new();
    for (i, (name, link)) in rows.iter().enumerate() {
        let r = i + 1;
        shared.push_str(&format!("<si><t>{}</t></si>", esc(name)));
        sheet_rows.push_str(&format!(
            r#"<row r="{r}"><c r="A{r}"><v>{r}</v></c><c r="B{r}" t="s"><v>{i}</v></c></row>"#
        ));
        if let Some(url) = link {
            let id = format!("rIdL{r}");
            links.push_str(&format!(r#"<hyperlink ref="B{r}" r:id="{id}"/>"#));
            rels.push_str(&format!(
                r#"<Relationship Id="{id}" Type="{REL_LINK}" Target="{}" TargetMode="External"/>"#,
                esc(url)
            ));
        }
    }

    for (n, (range, url)) in ranges.iter().enumerate() {
        let id = format!("rIdR{n}");
        links.push_str(&format!(r#"<hyperlink ref="{range}" r:id="{id}"/>"#));
        rels.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{REL_LINK}" Target="{}" TargetMode="External"/>"#,
            esc(url)
        ));
    }

    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets>
<sheet name="Cover" sheetId="1" r:id="rId1"/>
<sheet name="{}" sheetId="2" r:id="rId2"/>
</sheets></workbook>"#,
        esc(sheet_name)
    );
    let workbook_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="{NS_PKG_REL}">
<Relationship Id="rId1" Type="{REL_SHEET}" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="{REL_SHEET}" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#
    );
    let cover = format!(
        r#"<worksheet xmlns="{NS_MAIN}"><sheetData><row r="1"><c r="B1" t="inlineStr"><is><t>not the list</t></is></c></row></sheetData></worksheet>"#
    );
    let hyperlinks = if links.is_empty() {
        String::new()
    } else {
        format!("<hyperlinks>{links}</hyperlinks>")
    };
    let sheet = format!(
        r#"<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheetData>{sheet_rows}</sheetData>{hyperlinks}</worksheet>"#
    );
    let sheet_rels = format!(r#"<Relationships xmlns="{NS_PKG_REL}">{rels}</Relationships>"#);
    let sst = format!(r#"<sst xmlns="{NS_MAIN}">{shared}</sst>"#);

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    for (name, body) in [
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
        ("xl/sharedStrings.xml", sst),
        ("xl/worksheets/sheet1.xml", cover),
        ("xl/worksheets/sheet2.xml", sheet),
        ("xl/worksheets/_rels/sheet2.xml.rels", sheet_rels),
    ] {
        zw.start_file(name, opts).unwrap();
        zw.write_all(body.as_bytes()).unwrap();
    }
    zw.finish().unwrap().into_inner()
}

#[test]
fn reads_names_and_hyperlinks_from_named_sheet() {
    let bytes = build_xlsx(
        "Sheet1",
        &[
            ("Journal of Things & Stuff", Some("https://things.example/?a=1&b=2")),
            ("No Link Review", None),
            ("Annals of \"Quotes\"", Some("https://quotes.example")),
        ],
    );
    let rows = read_key_column(Cursor::new(bytes), &SheetSpec::new("Sheet1", "B")).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].key, "Journal of Things & Stuff");
    assert_eq!(rows[0].link.as_deref(), Some("https://things.example/?a=1&b=2"));
    assert_eq!(rows[1].key, "No Link Review");
    assert_eq!(rows[1].link, None);
    assert_eq!(rows[2].key, "Annals of \"Quotes\"");
    assert_eq!(rows[2].link.as_deref(), Some("https://quotes.example"));
}

#[test]
fn missing_sheet_or_non_zip_is_a_parse_error() {
    let bytes = build_xlsx("Other", &[("A", None)]);
    match read_key_column(Cursor::new(bytes), &SheetSpec::new("Sheet1", "B")) {
        Err(SyncError::Parse(msg)) => assert!(msg.contains("Sheet1"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }

    let err = read_key_column(Cursor::new(b"not a zip".to_vec()), &SheetSpec::new("Sheet1", "B"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn file_extractor_feeds_the_coordinator() {
    let root = unique_root("ingest");
    fs::create_dir_all(&root).unwrap();
    let book = root.join("journals.xlsx");
    fs::write(
        &book,
        build_xlsx("Sheet1", &[("Alpha", Some("https://alpha.example")), ("Beta", None)]),
    )
    .unwrap();

    let extractor = FileXlsxExtractor::new(SheetSpec::new("Sheet1", "B"));
    let rows = extractor.extract("Journal", &book.to_string_lossy()).unwrap();
    assert_eq!(rows.len(), 2);

    let store = SnapshotStore::new(root.join("data"));
    let meta = MetaLog::new(root.join("metadata"));
    let c = Coordinator::new(store.clone(), meta.clone(), extractor, Comparison::OrderSensitive);
    let plan = [EntitySource::new(
        "Journal",
        Some(book.to_string_lossy().into_owned()),
    )];
    let run = RunTimestamp::from_datetime(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());

    let report = c.run(&plan, run).unwrap();
    assert_eq!(
        report.outcome("Journal"),
        Some(&EntityOutcome::Updated {
            records: 2,
            created: true
        })
    );
    let text = fs::read_to_string(store.snapshot_path("Journal")).unwrap();
    assert_eq!(
        text,
        "Journal,Link,Since\nAlpha,https://alpha.example,2025-01-02 03:04:05\nBeta,,2025-01-02 03:04:05\n"
    );

    // Same workbook again: nothing changes.
    let report = c.run(&plan, run).unwrap();
    assert_eq!(
        report.outcome("Journal"),
        Some(&EntityOutcome::Unchanged { records: 2 })
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn wide_hyperlink_range_covers_rows_without_expanding() {
    let bytes = build_xlsx_with_ranges(
        "Sheet1",
        &[("Alpha", None), ("Beta", Some("https://beta.example"))],
        &[("B1:B1048576", "https://range.example")],
    );
    let started = Instant::now();
    let rows = read_key_column(Cursor::new(bytes), &SheetSpec::new("Sheet1", "B")).unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "took {:?}",
        started.elapsed()
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].link.as_deref(), Some("https://range.example"));
    // per-cell hyperlink comes first in <hyperlinks> and wins
    assert_eq!(rows[1].link.as_deref(), Some("https://beta.example"));
}

#[test]
fn hyperlink_range_past_sheet_limit_is_a_parse_error() {
    let bytes = build_xlsx_with_ranges(
        "Sheet1",
        &[("Alpha", None)],
        &[("B1:B4000000000", "https://range.example")],
    );
    let err = read_key_column(Cursor::new(bytes), &SheetSpec::new("Sheet1", "B")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
