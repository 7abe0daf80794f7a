use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use sheet_merge::MergeError;
use sheet_merge::formats::scan_folder;
use sheet_merge::ingestion::{
    LoadContext, LoadObserver, LoadOptions, LoadSeverity, LoadStats, SkipReason, TextEncoding,
    load_file,
};
use sheet_merge::types::Value;

fn s(v: &str) -> Value {
    Value::Utf8(v.to_string())
}

fn write_people_xlsx(path: &Path, with_empty_sheet: bool) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("People").unwrap();
    ws.write_string(0, 0, "Name").unwrap();
    ws.write_string(0, 1, "Age").unwrap();
    ws.write_string(1, 0, "Ada").unwrap();
    ws.write_number(1, 1, 36).unwrap();
    ws.write_string(2, 0, "Linus").unwrap();
    ws.write_number(2, 1, 28.5).unwrap();
    ws.write_string(3, 0, "Grace").unwrap();
    ws.write_boolean(3, 1, true).unwrap();

    if with_empty_sheet {
        wb.add_worksheet().set_name("Empty").unwrap();
        let only_header = wb.add_worksheet();
        only_header.set_name("HeaderOnly").unwrap();
        only_header.write_string(0, 0, "Name").unwrap();
    }
    wb.save(path).unwrap();
}

#[derive(Default)]
struct Recorder {
    loaded: Mutex<Vec<LoadStats>>,
    skipped: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<LoadSeverity>>,
}

impl LoadObserver for Recorder {
    fn on_loaded(&self, _ctx: &LoadContext, stats: LoadStats) {
        self.loaded.lock().unwrap().push(stats);
    }

    fn on_section_skipped(&self, _ctx: &LoadContext, section: &str, reason: &SkipReason) {
        self.skipped
            .lock()
            .unwrap()
            .push((section.to_string(), reason.to_string()));
    }

    fn on_failure(&self, _ctx: &LoadContext, severity: LoadSeverity, _error: &MergeError) {
        self.failures.lock().unwrap().push(severity);
    }
}

fn observed(recorder: &Arc<Recorder>) -> LoadOptions {
    LoadOptions {
        observer: Some(recorder.clone() as Arc<dyn LoadObserver>),
        ..LoadOptions::default()
    }
}

#[test]
fn workbook_sections_keep_typed_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path, false);

    let file = load_file(&path, &LoadOptions::default());
    assert_eq!(file.sections.len(), 1);
    let people = &file.sections[0];
    assert_eq!(people.name, "People");
    assert_eq!(people.columns(), ["Name", "Age"]);
    assert_eq!(
        people.data.rows,
        vec![
            vec![s("Ada"), Value::Int64(36)],
            vec![s("Linus"), Value::Float64(28.5)],
            vec![s("Grace"), Value::Bool(true)],
        ]
    );
    assert_eq!(file.encoding, None);
}

#[test]
fn date_cells_render_as_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dates.xlsx");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    ws.write_string(0, 0, "When").unwrap();
    let when = ExcelDateTime::from_ymd(2024, 3, 9).unwrap().and_hms(14, 5, 30).unwrap();
    ws.write_datetime_with_format(1, 0, &when, &stamp).unwrap();
    wb.save(&path).unwrap();

    let file = load_file(&path, &LoadOptions::default());
    assert_eq!(file.sections[0].data.rows[0], vec![s("2024-03-09 14:05:30")]);
}

#[test]
fn empty_sheets_are_skipped_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multi.xlsx");
    write_people_xlsx(&path, true);

    let recorder = Arc::new(Recorder::default());
    let file = load_file(&path, &observed(&recorder));

    let names: Vec<_> = file.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["People"]);
    assert_eq!(file.total_rows(), 3);

    let skipped = recorder.skipped.lock().unwrap();
    let skipped_names: Vec<_> = skipped.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(skipped_names, vec!["Empty", "HeaderOnly"]);
    assert_eq!(recorder.loaded.lock().unwrap().len(), 1);
    assert!(recorder.failures.lock().unwrap().is_empty());
}

#[test]
fn et_files_open_as_xlsx() {
    let dir = tempfile::tempdir().unwrap();
    let xlsx = dir.path().join("source.xlsx");
    write_people_xlsx(&xlsx, false);
    let et = dir.path().join("SOURCE.ET");
    std::fs::copy(&xlsx, &et).unwrap();

    let file = load_file(&et, &LoadOptions::default());
    assert_eq!(file.total_rows(), 3);
    assert_eq!(file.sections[0].name, "People");
}

#[test]
fn gbk_csv_falls_back_past_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gbk.csv");
    let (bytes, _, had_errors) = encoding_rs::GBK.encode("姓名,城市\n张三,北京\n李四,上海\n");
    assert!(!had_errors);
    std::fs::write(&path, &bytes).unwrap();

    let file = load_file(&path, &LoadOptions::default());
    assert_eq!(file.encoding, Some(TextEncoding::Gbk));
    let section = &file.sections[0];
    assert_eq!(section.name, "Sheet1");
    assert_eq!(section.columns(), ["姓名", "城市"]);
    assert_eq!(section.data.rows[1], vec![s("李四"), s("上海")]);
}

#[test]
fn bom_csv_decodes_as_utf8_sig_without_bom_in_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.csv");
    std::fs::write(&path, b"\xEF\xBB\xBFName,Age\nAda,36\n").unwrap();

    let file = load_file(&path, &LoadOptions::default());
    assert_eq!(file.encoding, Some(TextEncoding::Utf8Sig));
    assert_eq!(file.sections[0].columns(), ["Name", "Age"]);
}

#[test]
fn undecodable_csv_with_restricted_encodings_fails_softly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, b"Name\n\xFF\xFE\xFD\n").unwrap();

    let recorder = Arc::new(Recorder::default());
    let options = LoadOptions {
        encodings: vec![TextEncoding::Utf8],
        ..observed(&recorder)
    };
    let file = load_file(&path, &options);
    assert!(file.is_empty());
    assert_eq!(*recorder.failures.lock().unwrap(), vec![LoadSeverity::Error]);
}

#[test]
fn header_only_csv_and_missing_file_load_empty() {
    let dir = tempfile::tempdir().unwrap();
    let header_only = dir.path().join("header.csv");
    std::fs::write(&header_only, "Name,Age\n").unwrap();

    assert!(load_file(&header_only, &LoadOptions::default()).is_empty());
    assert!(load_file(dir.path().join("gone.xlsx"), &LoadOptions::default()).is_empty());
}

#[test]
fn folder_scan_filters_extensions_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.CSV", "a.xlsx", "c.Xls", "d.et", "notes.txt", "image.png"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

    let found: Vec<PathBuf> = scan_folder(dir.path()).unwrap();
    let names: Vec<_> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.xlsx", "b.CSV", "c.Xls", "d.et"]);
}

#[test]
fn folder_without_supported_files_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    assert!(matches!(
        scan_folder(dir.path()),
        Err(MergeError::NoSupportedFiles { .. })
    ));
}
